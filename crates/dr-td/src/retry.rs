//! Bounded fixed-delay retry of trading calls.
//!
//! [`RetryExecutor::execute`] makes at most `max_retries + 1` attempts. An
//! attempt succeeds when the call returns a 2xx response (or reports there was
//! nothing to do). Non-2xx responses and transport failures are retried after
//! a fixed delay; authentication rejections and business-rule errors are
//! returned immediately. Running out of attempts yields
//! [`BotError::RetryExhausted`].

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use dr_core::BotError;
use dr_core::config::RetryConfig;
use tracing::{error, info, warn};

use crate::response::ExchangeResponse;

/// Result of one trading call, as seen by the retry loop.
pub trait CallOutcome {
    /// The raw response, or `None` when the call had nothing to do.
    fn response(&self) -> Option<&ExchangeResponse>;
}

impl CallOutcome for ExchangeResponse {
    fn response(&self) -> Option<&ExchangeResponse> {
        Some(self)
    }
}

/// `None` means no request was needed (e.g. closing an already flat position).
impl CallOutcome for Option<ExchangeResponse> {
    fn response(&self) -> Option<&ExchangeResponse> {
        self.as_ref()
    }
}

/// Whether an error returned by a call is worth another attempt.
///
/// Typed errors defer to [`BotError::is_retryable`]; transport failures from
/// the HTTP client count as transient network errors.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(bot) = err.downcast_ref::<BotError>() {
        return bot.is_retryable();
    }
    err.downcast_ref::<reqwest::Error>().is_some()
}

/// Wraps an exchange call with bounded, fixed-delay retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    max_retries: u32,
    delay: Duration,
}

impl RetryExecutor {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(cfg.max_retries, cfg.delay())
    }

    /// Total attempts this executor will make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `call` until it succeeds, fails fatally, or attempts run out.
    pub async fn execute<T, F, Fut>(&self, action: &str, mut call: F) -> Result<T>
    where
        T: CallOutcome,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total = self.max_attempts();
        let mut attempt = 0;

        while attempt < total {
            attempt += 1;

            match call().await {
                Ok(outcome) => match outcome.response() {
                    None => {
                        info!("{action} SUCCESS - nothing to do");
                        return Ok(outcome);
                    }
                    Some(resp) if resp.is_success() => {
                        info!("{action} SUCCESS - api returned: {}", resp.body);
                        return Ok(outcome);
                    }
                    Some(resp) if resp.is_auth_rejection() => {
                        error!("{action} REJECTED - authentication failed: HTTP {} {}", resp.status, resp.body);
                        return Err(BotError::Authentication(format!("{action}: HTTP {} {}", resp.status, resp.body)).into());
                    }
                    Some(resp) => {
                        warn!("{action} FAILED (attempt {attempt}/{total}) - api returned: HTTP {} {}", resp.status, resp.body);
                    }
                },
                Err(e) if is_retryable(&e) => {
                    warn!("{action} FAILED (attempt {attempt}/{total}) - {e:#}");
                }
                Err(e) => {
                    error!("{action} FAILED - not retryable: {e:#}");
                    return Err(e);
                }
            }

            if attempt < total {
                tokio::time::sleep(self.delay).await;
            }
        }

        error!("{action} TOTAL FAIL - abandoning after {total} attempt(s)");
        Err(BotError::RetryExhausted { action: action.to_string(), attempts: total }.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;

    /// Call that returns HTTP 500 `failures` times, then 200.
    async fn flaky(counter: &AtomicU32, failures: u32) -> Result<ExchangeResponse> {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Ok(ExchangeResponse::new(500, json!({"code": -1001, "msg": "Internal error"})))
        } else {
            Ok(ExchangeResponse::new(200, json!({"orderId": 7})))
        }
    }

    fn executor(max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_with_exactly_enough_retries() {
        let calls = AtomicU32::new(0);
        let resp = executor(3).execute("OPEN LONG", || flaky(&calls, 3)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(resp.body["orderId"], 7);
    }

    #[tokio::test]
    async fn exhausts_with_one_retry_too_few() {
        let calls = AtomicU32::new(0);
        let err = executor(2).execute("OPEN LONG", || flaky(&calls, 3)).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err.downcast_ref::<BotError>() {
            Some(BotError::RetryExhausted { attempts, .. }) => assert_eq!(*attempts, 3),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let calls = AtomicU32::new(0);
        assert!(executor(0).execute("CLOSE POSITION", || flaky(&calls, 1)).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = executor(5)
            .execute("OPEN SHORT", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(ExchangeResponse::new(
                    400,
                    json!({"code": -1022, "msg": "Signature for this request is not valid."}),
                ))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::Authentication(_))));
    }

    #[tokio::test]
    async fn business_rule_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<ExchangeResponse> = executor(5)
            .execute("OPEN LONG", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<ExchangeResponse, _>(anyhow::Error::from(BotError::BusinessRule("quantity rounds to zero".into())))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_error_value_is_retried() {
        let calls = AtomicU32::new(0);
        let resp = executor(1)
            .execute("OPEN LONG", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow::Error::from(BotError::Transient { status: 502, body: "bad gateway".into() }))
                } else {
                    Ok(ExchangeResponse::new(200, json!({})))
                }
            })
            .await;
        assert!(resp.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn nothing_to_do_counts_as_success() {
        let calls = AtomicU32::new(0);
        let out = executor(2)
            .execute("CLOSE POSITION", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(None::<ExchangeResponse>)
            })
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
