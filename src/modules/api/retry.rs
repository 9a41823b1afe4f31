use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{AppError, AppResult};

/// How a failed attempt should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// 429 and 5xx: transient, retried with backoff.
    Retry,
    /// 401: surfaces immediately as an authentication error.
    Unauthorized,
    /// Any other 4xx: terminal, not retried.
    Terminal,
}

pub(crate) fn classify_status(status: StatusCode) -> Disposition {
    if status == StatusCode::UNAUTHORIZED {
        Disposition::Unauthorized
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Retry
    } else {
        Disposition::Terminal
    }
}

/// Per-attempt outcome fed back into [`with_backoff`].
pub(crate) enum AttemptError {
    Transient(String),
    Fatal(AppError),
}

/// Runs `op` up to `max_retries + 1` times with exponential backoff
/// starting at `base_delay` and doubling each retry. The sleep is
/// injected so the policy is testable without waiting.
///
/// Exhausting the budget surfaces the last transient failure wrapped
/// with the attempt count; fatal errors pass through immediately.
pub(crate) async fn with_backoff<T, Op, OpFut, Sleep, SleepFut>(
    max_retries: u32,
    base_delay: Duration,
    mut sleep: Sleep,
    mut op: Op,
) -> AppResult<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, AttemptError>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let attempts = max_retries + 1;
    let mut last_message = String::new();

    for attempt in 0..attempts {
        if attempt > 0 {
            sleep(base_delay * 2u32.pow(attempt - 1)).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Transient(message)) => {
                tracing::warn!(
                    "transient upstream failure (attempt {}/{}): {}",
                    attempt + 1,
                    attempts,
                    message
                );
                last_message = message;
            }
        }
    }

    Err(AppError::Transient {
        attempts,
        message: last_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn status_classification() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Disposition::Unauthorized
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Disposition::Retry
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Disposition::Retry
        );
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), Disposition::Retry);
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            Disposition::Terminal
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Disposition::Terminal
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            Disposition::Terminal
        );
    }

    #[tokio::test]
    async fn success_after_two_transient_failures_sleeps_twice() {
        let calls = Arc::new(AtomicU32::new(0));
        let sleeps: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));

        let op_calls = calls.clone();
        let sleep_log = sleeps.clone();
        let result = with_backoff(
            3,
            Duration::from_secs(1),
            move |d| {
                let log = sleep_log.clone();
                async move {
                    log.lock().unwrap().push(d);
                }
            },
            move || {
                let n = op_calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AttemptError::Transient(format!("HTTP 500 (call {})", n)))
                    } else {
                        Ok("body")
                    }
                }
            },
        )
        .await
        .expect("third attempt succeeds");

        assert_eq!(result, "body");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempt_count_and_last_error() {
        let sleeps: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
        let sleep_log = sleeps.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let op_calls = calls.clone();

        let err = with_backoff(
            3,
            Duration::from_secs(1),
            move |d| {
                let log = sleep_log.clone();
                async move {
                    log.lock().unwrap().push(d);
                }
            },
            move || {
                let n = op_calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(AttemptError::Transient(format!("boom {}", n))) }
            },
        )
        .await
        .expect_err("must exhaust");

        match err {
            AppError::Transient { attempts, message } => {
                assert_eq!(attempts, 4);
                assert_eq!(message, "boom 3");
            }
            other => panic!("expected Transient, got {:?}", other),
        }
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test]
    async fn fatal_error_short_circuits_without_sleeping() {
        let sleeps: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
        let sleep_log = sleeps.clone();

        let err = with_backoff(
            3,
            Duration::from_secs(1),
            move |d| {
                let log = sleep_log.clone();
                async move {
                    log.lock().unwrap().push(d);
                }
            },
            || async { Err::<(), _>(AttemptError::Fatal(AppError::Auth("401".to_string()))) },
        )
        .await
        .expect_err("must fail");

        assert!(matches!(err, AppError::Auth(_)));
        assert!(sleeps.lock().unwrap().is_empty());
    }
}
