use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

pub mod key;

/// Durable, namespaced key->value store. Each namespace is one JSON object
/// persisted at `<dir>/<namespace>_cache.json`, loaded lazily on first
/// access, held fully in memory, and rewritten whole on every mutation.
///
/// Load failures degrade to an empty namespace; save failures leave the
/// in-memory state ahead of disk until the next successful write. Neither is
/// ever fatal.
///
/// Individual operations are serialized by a mutex, but there are no
/// cross-call transactions: concurrent writers must use disjoint keys (every
/// key in this pipeline embeds the query id and, where relevant, the report
/// hash). A same-key race is last-write-wins.
#[derive(Clone)]
pub struct CacheStore {
    dir: PathBuf,
    namespaces: Arc<Mutex<HashMap<String, BTreeMap<String, Value>>>>,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            namespaces: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let mut guard = self.namespaces.lock().unwrap();
        let ns = self.load_if_needed(&mut guard, namespace);
        ns.get(key).cloned()
    }

    /// Typed `get`; a cached value that no longer decodes is treated as a
    /// miss so the caller regenerates it.
    pub fn get_as<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let value = self.get(namespace, key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(namespace, key, "cached value failed to decode: {}", e);
                None
            }
        }
    }

    /// Synchronous, durable set: the namespace file is rewritten before this
    /// returns. A failed write is logged and the in-memory value kept.
    pub fn set<T: Serialize>(&self, namespace: &str, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                error!(namespace, key, "value failed to serialize, not cached: {}", e);
                return;
            }
        };
        let mut guard = self.namespaces.lock().unwrap();
        let ns = self.load_if_needed(&mut guard, namespace);
        ns.insert(key.to_string(), value);
        self.save(namespace, ns);
    }

    pub fn has(&self, namespace: &str, key: &str) -> bool {
        let mut guard = self.namespaces.lock().unwrap();
        let ns = self.load_if_needed(&mut guard, namespace);
        ns.contains_key(key)
    }

    pub fn remove(&self, namespace: &str, key: &str) -> bool {
        let mut guard = self.namespaces.lock().unwrap();
        let ns = self.load_if_needed(&mut guard, namespace);
        let removed = ns.remove(key).is_some();
        if removed {
            self.save(namespace, ns);
        }
        removed
    }

    pub fn clear(&self, namespace: &str) {
        let mut guard = self.namespaces.lock().unwrap();
        let ns = self.load_if_needed(&mut guard, namespace);
        ns.clear();
        self.save(namespace, ns);
    }

    pub fn size(&self, namespace: &str) -> usize {
        let mut guard = self.namespaces.lock().unwrap();
        let ns = self.load_if_needed(&mut guard, namespace);
        ns.len()
    }

    fn file_path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}_cache.json", namespace))
    }

    fn load_if_needed<'a>(
        &self,
        guard: &'a mut HashMap<String, BTreeMap<String, Value>>,
        namespace: &str,
    ) -> &'a mut BTreeMap<String, Value> {
        if !guard.contains_key(namespace) {
            let loaded = self.load(namespace);
            guard.insert(namespace.to_string(), loaded);
        }
        guard.get_mut(namespace).unwrap()
    }

    fn load(&self, namespace: &str) -> BTreeMap<String, Value> {
        let path = self.file_path(namespace);
        if !path.exists() {
            return BTreeMap::new();
        }
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(namespace, "failed to read {}: {}", path.display(), e);
                return BTreeMap::new();
            }
        };
        match serde_json::from_str::<BTreeMap<String, Value>>(&raw) {
            Ok(map) => {
                debug!(namespace, items = map.len(), "loaded cache namespace");
                map
            }
            Err(e) => {
                warn!(namespace, "corrupt cache file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }
    }

    fn save(&self, namespace: &str, ns: &BTreeMap<String, Value>) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            error!(namespace, "failed to create cache dir: {}", e);
            return;
        }
        let path = self.file_path(namespace);
        let body = match serde_json::to_string_pretty(ns) {
            Ok(body) => body,
            Err(e) => {
                error!(namespace, "failed to encode cache namespace: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, body) {
            error!(namespace, "failed to save {}: {}", path.display(), e);
        }
    }
}
