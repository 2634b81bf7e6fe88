use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::llm::{ChatClient, ChatMessage, ChatReply};

/// Serves canned responses from a JSONL file, keyed by the rendered prompt
/// text. Used for offline runs and deterministic tests. A prompt with no
/// recorded response yields the failure sentinel, which the retry layer
/// surfaces as an exhausted call.
#[derive(Clone)]
pub struct ReplayClient {
    replies: Arc<HashMap<String, String>>,
}

impl ReplayClient {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("failed to open replay file {}: {}", path.display(), e))?;
        let reader = std::io::BufReader::new(file);

        #[derive(serde::Deserialize)]
        struct ReplayEntry {
            prompt: String,
            response: String,
        }

        let mut replies = HashMap::new();
        use std::io::BufRead;
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ReplayEntry = serde_json::from_str(&line)
                .map_err(|e| anyhow::anyhow!("line {}: failed to parse replay entry: {}", i + 1, e))?;
            if replies.contains_key(&entry.prompt) {
                anyhow::bail!("line {}: duplicate prompt in replay file", i + 1);
            }
            replies.insert(entry.prompt, entry.response);
        }

        Ok(Self {
            replies: Arc::new(replies),
        })
    }
}

#[async_trait]
impl ChatClient for ReplayClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatReply> {
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        match self.replies.get(prompt) {
            Some(text) => Ok(ChatReply {
                text: text.clone(),
                cost_usd: 0.0,
            }),
            None => Ok(ChatReply::failure()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn replay_happy_path() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, r#"{{"prompt": "hello", "response": "world"}}"#)?;
        writeln!(tmp, r#"{{"prompt": "foo", "response": "bar"}}"#)?;

        let client = ReplayClient::from_path(tmp.path())?;
        let reply = client.complete(&[ChatMessage::user("hello")]).await?;
        assert_eq!(reply.text, "world");
        assert_eq!(reply.cost_usd, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn miss_yields_failure_sentinel() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, r#"{{"prompt": "exists", "response": "yes"}}"#)?;

        let client = ReplayClient::from_path(tmp.path())?;
        let reply = client.complete(&[ChatMessage::user("missing")]).await?;
        assert!(reply.is_failure());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_prompt_rejected() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, r#"{{"prompt": "dup", "response": "1"}}"#)?;
        writeln!(tmp, r#"{{"prompt": "dup", "response": "2"}}"#)?;

        assert!(ReplayClient::from_path(tmp.path()).is_err());
        Ok(())
    }
}
