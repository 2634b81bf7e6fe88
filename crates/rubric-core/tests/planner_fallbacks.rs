//! Planner degradation paths: unusable collaborator output must never fail
//! a query, only fall back to the fixed frame, and fallbacks are cached like
//! any other stage outcome.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rubric_core::cache::CacheStore;
use rubric_core::model::Query;
use rubric_core::planner::{DimensionPlanner, FIXED_DIMENSIONS, WEIGHT_SUM_TOLERANCE};
use rubric_core::providers::llm::{ChatClient, ChatMessage, ChatReply};
use tempfile::tempdir;

fn query() -> Query {
    Query {
        id: 9,
        prompt: "Assess the economics of small modular reactors.".to_string(),
    }
}

struct ProseClient {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl ChatClient for ProseClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<ChatReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatReply {
            text: "I would rather describe this in prose, thanks.".to_string(),
            cost_usd: 0.0,
        })
    }

    fn provider_name(&self) -> &'static str {
        "prose"
    }
}

struct SentinelClient;

#[async_trait]
impl ChatClient for SentinelClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<ChatReply> {
        Ok(ChatReply::failure())
    }

    fn provider_name(&self) -> &'static str {
        "sentinel"
    }
}

struct EnrichedClient;

#[async_trait]
impl ChatClient for EnrichedClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatReply> {
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let text = if prompt.contains("<additional_meta_dimensions_json>") {
            // Raw sum is 2.0 and the keys are free text.
            r#"<json_output>{"Coverage": 0.5, "Insight": 0.5, "Instruction Following": 0.5, "Clarity": 0.25, "Data Recency": 0.25}</json_output>"#
                .to_string()
        } else if prompt.contains("task-specific evaluation criteria") {
            r#"<json_output>[
                {"criterion": "primary sources cited", "explanation": "e", "weight": 3.0},
                {"criterion": "recent data used", "explanation": "e", "weight": 1.0}
            ]</json_output>"#
                .to_string()
        } else {
            r#"<json_output>[{"meta_dimension_name": "Data Recency", "definition": "Freshness of the underlying sources"}]</json_output>"#
                .to_string()
        };
        Ok(ChatReply { text, cost_usd: 0.0 })
    }

    fn provider_name(&self) -> &'static str {
        "enriched"
    }
}

#[tokio::test]
async fn prose_output_degrades_to_the_fixed_frame() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let calls = Arc::new(AtomicU32::new(0));
    let client: Arc<dyn ChatClient> = Arc::new(ProseClient { calls: calls.clone() });
    let planner = DimensionPlanner::new(client, CacheStore::new(dir.path()), 3);

    let plan = planner.plan(&query()).await;

    // Four fixed dimensions, equal weights, one default criterion each.
    assert!(plan.additional_dimensions.is_empty());
    assert_eq!(plan.dimensions.len(), 4);
    for (name, _) in FIXED_DIMENSIONS {
        assert!((plan.weights[name] - 0.25).abs() < 1e-12);
        let criteria = &plan.criteria[name];
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].criterion, format!("General {} assessment", name));
        assert_eq!(criteria[0].weight, 1.0);
    }

    // 1 dimensions + 1 weights + 4 criteria, fallbacks included, all cached.
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    let again = planner.plan(&query()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(again.dimensions.len(), 4);
    Ok(())
}

#[tokio::test]
async fn sentinel_failures_also_degrade_gracefully() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let client: Arc<dyn ChatClient> = Arc::new(SentinelClient);
    // Single attempt: the sentinel exhausts the call budget immediately.
    let planner = DimensionPlanner::new(client, CacheStore::new(dir.path()), 1);

    let plan = planner.plan(&query()).await;
    assert_eq!(plan.dimensions.len(), 4);
    let sum: f64 = plan.weights.values().sum();
    assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    for list in plan.criteria.values() {
        assert_eq!(list.len(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn generated_frame_is_canonicalized_and_renormalized() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let client: Arc<dyn ChatClient> = Arc::new(EnrichedClient);
    let planner = DimensionPlanner::new(client, CacheStore::new(dir.path()), 3);

    let plan = planner.plan(&query()).await;

    // The additional dimension joins the fixed four under a canonical key.
    assert_eq!(plan.dimensions.len(), 5);
    assert!(plan.dimensions.contains_key("data_recency"));
    assert_eq!(plan.additional_dimensions[0].name, "Data Recency");

    // Raw weights summed to 2.0: everything halves.
    assert!((plan.weights["coverage"] - 0.25).abs() < 1e-9);
    assert!((plan.weights["instruction_following"] - 0.25).abs() < 1e-9);
    assert!((plan.weights["data_recency"] - 0.125).abs() < 1e-9);
    let sum: f64 = plan.weights.values().sum();
    assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);

    // Criterion weights 3:1 renormalize to 0.75/0.25 in every dimension.
    for list in plan.criteria.values() {
        assert_eq!(list.len(), 2);
        assert!((list[0].weight - 0.75).abs() < 1e-9);
        assert!((list[1].weight - 0.25).abs() < 1e-9);
    }
    Ok(())
}
