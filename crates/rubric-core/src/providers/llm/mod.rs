use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RetryExhausted;
use crate::retry;

/// Literal sentinel a provider may return in place of text to signal an
/// unrecoverable call failure. Distinct from an `Err`: callers must check
/// for it explicitly via [`ChatReply::is_failure`].
pub const FAILURE_SENTINEL: &str = "$ERROR$";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One complete collaborator response. `cost_usd` is the spend for this call
/// alone; totals are aggregated by the orchestrator, never accumulated in
/// the client.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub cost_usd: f64,
}

impl ChatReply {
    pub fn failure() -> Self {
        Self {
            text: FAILURE_SENTINEL.to_string(),
            cost_usd: 0.0,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.text == FAILURE_SENTINEL
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One call, one complete response. No streaming.
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatReply>;
    fn provider_name(&self) -> &'static str;
}

/// Call the collaborator with backoff. Transport errors and the failure
/// sentinel are both retryable; exhaustion surfaces as a typed error the
/// caller logs and treats as absence of a result.
pub async fn generate(
    client: &dyn ChatClient,
    messages: &[ChatMessage],
    max_attempts: u32,
) -> Result<ChatReply, RetryExhausted> {
    retry::with_backoff("collaborator call", max_attempts, || async move {
        let reply = client.complete(messages).await?;
        if reply.is_failure() {
            anyhow::bail!("collaborator returned the failure sentinel");
        }
        Ok(reply)
    })
    .await
}

pub mod openai;
