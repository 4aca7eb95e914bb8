//! Caller-side retry for backend queries.
//!
//! The controllers never retry on their own; callers that want a retry
//! policy wrap a query in [`retry_async`] or use [`Retrying`].

use std::future::Future;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::client::{ClientError, RiskApi};
use crate::logging::{self, obj, v_int, v_str, Domain};
use crate::model::{Address, RiskAssessment};

/// Retry configuration
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Calculate delay with exponential backoff and jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (clamped + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

/// Retry a fallible async query with exponential backoff.
///
/// Only errors accepted by [`is_retryable`] are retried; anything else is
/// returned immediately.
pub async fn retry_async<F, Fut, T>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < config.max_retries && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt);
                logging::warn(
                    Domain::Http,
                    "retry",
                    obj(&[
                        ("operation", v_str(operation_name)),
                        ("attempt", v_int(u64::from(attempt) + 1)),
                        ("of", v_int(u64::from(config.max_retries) + 1)),
                        ("error", v_str(&e.to_string())),
                        ("delay_ms", v_int(delay.as_millis() as u64)),
                    ]),
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Categorize errors for retry decisions
pub fn is_retryable(err: &ClientError) -> bool {
    if let Some(status) = err.status() {
        return is_retryable_http_error(status);
    }
    matches!(err, ClientError::Transport(_))
}

pub fn is_retryable_http_error(status: u16) -> bool {
    matches!(status,
        408 |   // Request Timeout
        429 |   // Too Many Requests
        500 |   // Internal Server Error
        502 |   // Bad Gateway
        503 |   // Service Unavailable
        504     // Gateway Timeout
    )
}

/// A [`RiskApi`] that retries the wrapped client's risk lookups.
///
/// Searches are passed through untouched: a failed search is simply
/// superseded by the next keystroke.
pub struct Retrying<C> {
    inner: C,
    config: RetryConfig,
}

impl<C> Retrying<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<C: RiskApi + Send + Sync> RiskApi for Retrying<C> {
    async fn search(&self, query: &str) -> Result<Vec<Address>, ClientError> {
        self.inner.search(query).await
    }

    async fn risk_for(&self, address: &Address) -> Result<RiskAssessment, ClientError> {
        retry_async(&self.config, "risk", || self.inner.risk_for(address)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000)); // clamped
    }

    #[tokio::test]
    async fn test_retry_eventual_success() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            ..Default::default()
        };
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry_async(&config, "test", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClientError::Http { status: 503 })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let config = RetryConfig {
            base_delay_ms: 1,
            ..Default::default()
        };
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), ClientError> = retry_async(&config, "test", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Http { status: 404 })
            }
        })
        .await;

        assert_eq!(result, Err(ClientError::Http { status: 404 }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&ClientError::Http { status: 503 }));
        assert!(is_retryable(&ClientError::Http { status: 429 }));
        assert!(!is_retryable(&ClientError::Http { status: 404 }));
        assert!(is_retryable(&ClientError::Transport("reset".into())));
        assert!(!is_retryable(&ClientError::Decode("eof".into())));
        assert!(!is_retryable(&ClientError::InvalidRequest("bad url".into())));
        assert_eq!(ClientError::Http { status: 502 }.status(), Some(502));
        assert_eq!(ClientError::Transport("reset".into()).status(), None);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let config = RetryConfig::with_max_retries(0);
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), ClientError> = retry_async(&config, "test", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Transport("refused".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
