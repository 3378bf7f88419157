//! Retry with exponential back-off and jitter for backend HTTP calls.
//!
//! Owned by the calling stage (embedding, synthesis). The vector store never
//! retries on its own.

use std::future::Future;
use std::time::Duration;

use crate::error::PipelineError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// Timeouts, connection failures, 429 and 5xx responses are transient.
/// Decode errors and dimension or count mismatches will not fix themselves.
pub(crate) fn is_retriable(err: &PipelineError) -> bool {
    match err {
        PipelineError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        PipelineError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// The delay before attempt `n + 1` is `backoff_base_ms × 2ⁿ⁻¹` with ±25 %
/// jitter, capped at 30 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    service: &'static str,
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    service,
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient backend error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn server_errors_are_retriable() {
        assert!(is_retriable(&PipelineError::UpstreamStatus {
            service: "Ollama",
            status: 503
        }));
        assert!(is_retriable(&PipelineError::UpstreamStatus {
            service: "Ollama",
            status: 429
        }));
    }

    #[test]
    fn client_and_shape_errors_are_not_retriable() {
        assert!(!is_retriable(&PipelineError::UpstreamStatus {
            service: "TEI",
            status: 404
        }));
        assert!(!is_retriable(&PipelineError::DimensionMismatch {
            expected: 384,
            got: 3
        }));
        assert!(!is_retriable(&PipelineError::Decode {
            service: "TEI",
            reason: "bad json".into()
        }));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff("test", 3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(PipelineError::UpstreamStatus {
                        service: "test",
                        status: 502,
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff("test", 2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(PipelineError::UpstreamStatus {
                    service: "test",
                    status: 500,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff("test", 5, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(PipelineError::UpstreamStatus {
                    service: "test",
                    status: 400,
                })
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(PipelineError::UpstreamStatus { status: 400, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
