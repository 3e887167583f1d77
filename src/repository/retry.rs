use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Substrings that mark an error as eligible for retry (§5). Resolved per
/// the Open Question in spec.md §9: plain `str::contains`, not the source's
/// hand-rolled (and buggy) substring matcher.
const RETRYABLE_SUBSTRINGS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timeout",
    "temporary failure",
    "deadlock",
    "lock wait timeout",
];

fn is_retryable(err: &AppError) -> bool {
    let msg = err.to_string().to_lowercase();
    RETRYABLE_SUBSTRINGS.iter().any(|needle| msg.contains(needle))
}

/// Retry an operational repository call up to `max_retries` times with
/// exponential backoff `100ms * (attempt + 1)`, per §5. Only errors whose
/// message matches [`is_retryable`] are retried; business-logic failures
/// (`NotFound`, `Forbidden`, `Duplicate`, ...) abort immediately since
/// retrying them can never change the outcome.
pub async fn with_retries<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt + 1 < max_retries && is_retryable(&e) => {
                let backoff = Duration::from_millis(100 * (attempt as u64 + 1));
                tracing::warn!(attempt, error = %e, "retrying transient repository error");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retryable_substrings_match_case_insensitively() {
        assert!(is_retryable(&AppError::Unavailable(
            "Connection Reset by peer".into()
        )));
        assert!(is_retryable(&AppError::Unavailable("deadlock detected".into())));
        assert!(!is_retryable(&AppError::NotFound("message not found".into())));
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retries(5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::Unavailable("connection reset".into()))
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_business_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = with_retries(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Forbidden("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = with_retries(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Unavailable("timeout".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
