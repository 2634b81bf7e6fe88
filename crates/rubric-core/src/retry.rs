use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::RetryExhausted;

/// Run `f` up to `max_attempts` times, sleeping `2^attempt` seconds between
/// failures. Returns the first success, or a typed exhaustion error carrying
/// the last failure text.
pub async fn with_backoff<T, F, Fut>(op: &str, max_attempts: u32, mut f: F) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_error = String::new();
    for attempt in 0..max_attempts {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_error = format!("{:#}", e);
                warn!(
                    "{} attempt {}/{} failed: {}",
                    op,
                    attempt + 1,
                    max_attempts,
                    last_error
                );
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(Duration::from_secs(1u64 << attempt)).await;
                }
            }
        }
    }
    Err(RetryExhausted {
        op: op.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn first_success_short_circuits() {
        let calls = AtomicU32::new(0);
        let out = with_backoff("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(7u32) }
        })
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempts_and_last_error() {
        let out: Result<u32, _> = with_backoff("doomed op", 1, || async {
            anyhow::bail!("boom")
        })
        .await;
        let err = out.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.op, "doomed op");
        assert!(err.last_error.contains("boom"));
    }

    #[tokio::test]
    async fn retries_until_budget_spent() {
        let calls = std::sync::Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: Result<u32, _> = with_backoff("flaky op", 2, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("still failing")
            }
        })
        .await;
        let err = out.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
