use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{ChatClient, ChatMessage, ChatReply};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Price per 1000 tokens (input, output) in USD. Unknown models cost 0.0.
const MODEL_PRICES: &[(&str, f64, f64)] = &[
    ("gpt-5", 0.00125, 0.010),
    ("gpt-5-mini", 0.00025, 0.002),
    ("gpt-5-nano", 0.00005, 0.0004),
];

/// Chat-completions client for OpenAI-compatible endpoints (OpenAI proper or
/// OpenRouter via `base_url`).
pub struct OpenAiClient {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        model: String,
        api_key: String,
        base_url: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            temperature,
            max_tokens,
            api_key,
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatReply> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("chat API error ({}): {}", status, error_text);
        }

        let payload: serde_json::Value = resp.json().await?;

        let text = payload
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("chat API response missing content"))?
            .to_string();

        let cost_usd = call_cost(&self.model, &payload);

        Ok(ChatReply { text, cost_usd })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn call_cost(model: &str, payload: &serde_json::Value) -> f64 {
    let Some((input_price, output_price)) = price_for(model) else {
        debug!(model, "no price entry, cost recorded as 0.0");
        return 0.0;
    };
    let prompt_tokens = payload
        .pointer("/usage/prompt_tokens")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let completion_tokens = payload
        .pointer("/usage/completion_tokens")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    (prompt_tokens / 1000.0) * input_price + (completion_tokens / 1000.0) * output_price
}

fn price_for(model: &str) -> Option<(f64, f64)> {
    // Exact match first; routed model ids (e.g. "openai/gpt-5-mini") match by
    // containment.
    for (name, input, output) in MODEL_PRICES {
        if model == *name {
            return Some((*input, *output));
        }
    }
    for (name, input, output) in MODEL_PRICES {
        if model.contains(name) {
            return Some((*input, *output));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_uses_usage_tokens() {
        let payload = serde_json::json!({
            "usage": {"prompt_tokens": 2000, "completion_tokens": 1000}
        });
        let cost = call_cost("gpt-5-mini", &payload);
        // 2 * 0.00025 + 1 * 0.002
        assert!((cost - 0.0025).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_costs_zero() {
        let payload = serde_json::json!({
            "usage": {"prompt_tokens": 1000, "completion_tokens": 1000}
        });
        assert_eq!(call_cost("somebody-elses-model", &payload), 0.0);
    }

    #[test]
    fn routed_model_id_matches_by_containment() {
        assert!(price_for("openai/gpt-5-nano").is_some());
        assert!(price_for("gpt-5").is_some());
    }
}
