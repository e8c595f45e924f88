//! LLM provider implementations.
//!
//! `create_provider()` instantiates the OpenAI-compatible provider from config;
//! `with_retry()` wraps a fallible model-backed operation in exponential backoff.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::{GrepragError, LlmError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use openai_compat::OpenAiCompatibleProvider;

/// Build the configured provider.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatibleProvider::new(config)?;
    tracing::debug!(model = %config.model, base_url = %config.base_url, "Created LLM provider");
    Ok(Arc::new(provider))
}

/// Execute an async operation, retrying transient model failures with exponential backoff.
///
/// Only `GrepragError::Llm` errors for which [`LlmError::is_retryable`] holds are
/// retried; everything else returns immediately.
pub async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> Result<T, GrepragError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GrepragError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(GrepragError::Llm(e)) if e.is_retryable() && attempt < max_retries => {
                let wait = backoff_delay(attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = max_retries,
                    backoff_secs = wait.as_secs(),
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delay before retry number `attempt + 1`: `min(2^attempt, 32)` seconds, or the
/// server's retry-after hint when that is longer.
pub fn backoff_delay(attempt: u32, error: &LlmError) -> Duration {
    let backoff_secs = std::cmp::min(1u64 << attempt.min(6), 32);
    let wait = match error {
        LlmError::RateLimited { retry_after_secs } => std::cmp::max(*retry_after_secs, backoff_secs),
        _ => backoff_secs,
    };
    Duration::from_secs(wait)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay() {
        let timeout = LlmError::Timeout { timeout_secs: 1 };
        assert_eq!(backoff_delay(0, &timeout), Duration::from_secs(1));
        assert_eq!(backoff_delay(3, &timeout), Duration::from_secs(8));
        assert_eq!(backoff_delay(10, &timeout), Duration::from_secs(32));

        let limited = LlmError::RateLimited {
            retry_after_secs: 20,
        };
        assert_eq!(backoff_delay(0, &limited), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(GrepragError::Llm(LlmError::Connection {
                    message: "reset".into(),
                }))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(2, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GrepragError::Llm(LlmError::Timeout { timeout_secs: 5 }))
        })
        .await;
        assert!(matches!(result, Err(GrepragError::Llm(LlmError::Timeout { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GrepragError::Llm(LlmError::AuthFailed {
                provider: "openrouter".into(),
            }))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_provider_with_inline_key() {
        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "x-ai/grok-4.1-fast");
    }
}
