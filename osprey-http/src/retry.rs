//! Retry executor and retriers.
//!
//! The executor drives a fallible async operation until it succeeds or the
//! policy gives up:
//!
//! ```text
//! Idle -> Attempting -> Success
//!                    -> Retrying -> Attempting
//!                    -> Exhausted (last error)
//! ```
//!
//! The operation always runs at least once. The attempt counter lives in the
//! executor call, so policies and retriers can be shared freely.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::trace;

use crate::backoff::Backoff;
use crate::error::Retryable;

/// Decides, per failed attempt, whether and when to try again.
pub trait Retrier<E: ?Sized>: Send + Sync {
    /// Wait before retry number `retry` (1-based) after `error`, or `None`
    /// to give up and surface the error.
    fn retry(&self, retry: u32, error: &E) -> Option<Duration>;
}

/// Retries transient errors according to a backoff policy.
///
/// Errors that are not retryable give up immediately, unless they carry one
/// of the configured envelope status codes. Cancellations always give up.
#[derive(Debug, Clone)]
pub struct BackoffRetrier<B> {
    backoff: B,
    retry_status_codes: Vec<u16>,
}

impl<B: Backoff> BackoffRetrier<B> {
    /// Create a retrier around a backoff policy.
    pub fn new(backoff: B) -> Self {
        Self {
            backoff,
            retry_status_codes: Vec::new(),
        }
    }

    /// Also retry responses with these envelope status codes.
    pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    /// The wrapped backoff policy.
    pub fn backoff(&self) -> &B {
        &self.backoff
    }
}

impl<B, E> Retrier<E> for BackoffRetrier<B>
where
    B: Backoff,
    E: Retryable + ?Sized,
{
    fn retry(&self, retry: u32, error: &E) -> Option<Duration> {
        if error.is_cancellation() {
            return None;
        }
        let status_retry = error
            .status_code()
            .is_some_and(|status| self.retry_status_codes.contains(&status));
        if !error.is_retryable() && !status_retry {
            return None;
        }
        self.backoff.next(retry)
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopRetrier;

impl<E: ?Sized> Retrier<E> for StopRetrier {
    fn retry(&self, _retry: u32, _error: &E) -> Option<Duration> {
        None
    }
}

/// Adapts a bare backoff policy so it retries every error.
struct AnyError<'a, B: ?Sized, E: ?Sized> {
    backoff: &'a B,
    _error: PhantomData<fn(&E)>,
}

impl<B, E> Retrier<E> for AnyError<'_, B, E>
where
    B: Backoff + ?Sized,
    E: ?Sized,
{
    fn retry(&self, retry: u32, _error: &E) -> Option<Duration> {
        self.backoff.next(retry)
    }
}

/// Run `operation` until it succeeds or `backoff` stops; returns the last
/// error on exhaustion.
pub async fn retry<T, E, F, Fut, B>(operation: F, backoff: &B) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    B: Backoff + ?Sized,
{
    retry_notify(operation, backoff, |_: &E, _| {}).await
}

/// Like [`retry`], calling `notify` with the error and the upcoming wait
/// before every sleep. `notify` is not called when the policy gives up.
pub async fn retry_notify<T, E, F, Fut, B, N>(operation: F, backoff: &B, notify: N) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    B: Backoff + ?Sized,
    N: FnMut(&E, Duration),
{
    let retrier = AnyError {
        backoff,
        _error: PhantomData,
    };
    retry_with(operation, &retrier, notify).await
}

/// Run `operation`, asking `retrier` after each failure whether to go on.
pub async fn retry_with<T, E, F, Fut, R, N>(
    mut operation: F,
    retrier: &R,
    mut notify: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Retrier<E> + ?Sized,
    N: FnMut(&E, Duration),
{
    let mut retries: u32 = 0;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        retries += 1;
        let Some(wait) = retrier.retry(retries, &error) else {
            trace!(attempts = retries, "Giving up after failed attempt");
            return Err(error);
        };

        notify(&error, wait);

        if wait > Duration::ZERO {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{BackoffExt, ConstantBackoff, StopBackoff, ZeroBackoff};
    use crate::error::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_on_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, &str> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
            &ZeroBackoff,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted_runs_k_plus_one_times() {
        let calls = AtomicU32::new(0);
        let backoff = ZeroBackoff.with_max_retries(3);

        let result: Result<(), String> = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {n}")) }
            },
            &backoff,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result, Err("failure 4".to_string()));
    }

    #[tokio::test]
    async fn test_retry_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let backoff = ZeroBackoff.with_max_retries(5);

        let result: Result<&str, &str> = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("not yet") } else { Ok("done") } }
            },
            &backoff,
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stop_backoff_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
            &StopBackoff,
        )
        .await;

        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notify_called_only_before_retries() {
        let mut notified = Vec::new();
        let backoff = ConstantBackoff::new(Duration::from_millis(5)).with_max_retries(2);

        let result: Result<(), &str> = retry_notify(
            || async { Err("boom") },
            &backoff,
            |err: &&str, wait| notified.push((err.to_string(), wait)),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(
            notified,
            vec![
                ("boom".to_string(), Duration::from_millis(5)),
                ("boom".to_string(), Duration::from_millis(5)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts() {
        let start = tokio::time::Instant::now();
        let backoff = ConstantBackoff::new(Duration::from_secs(2)).with_max_retries(2);

        let _: Result<(), &str> = retry(|| async { Err("boom") }, &backoff).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_backoff_retrier_skips_permanent_errors() {
        let calls = AtomicU32::new(0);
        let retrier = BackoffRetrier::new(ZeroBackoff.with_max_retries(5));

        let result: Result<(), TransportError> = retry_with(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::InvalidUrl("nope".to_string())) }
            },
            &retrier,
            |_, _| {},
        )
        .await;

        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_retrier_never_retries_cancellation() {
        let calls = AtomicU32::new(0);
        let retrier = BackoffRetrier::new(ZeroBackoff);

        let result: Result<(), TransportError> = retry_with(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::Canceled("context canceled".to_string())) }
            },
            &retrier,
            |_, _| {},
        )
        .await;

        assert!(matches!(result, Err(TransportError::Canceled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_retrier_retries_connection_errors() {
        let calls = AtomicU32::new(0);
        let retrier = BackoffRetrier::new(ZeroBackoff.with_max_retries(2));

        let result: Result<(), TransportError> = retry_with(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::Connection("refused".to_string())) }
            },
            &retrier,
            |_, _| {},
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    struct StatusError(u16);

    impl Retryable for StatusError {
        fn is_retryable(&self) -> bool {
            false
        }

        fn status_code(&self) -> Option<u16> {
            Some(self.0)
        }
    }

    #[test]
    fn test_backoff_retrier_status_codes() {
        let retrier = BackoffRetrier::new(ZeroBackoff).with_status_codes([429, 503]);
        assert!(retrier.retry(1, &StatusError(429)).is_some());
        assert!(retrier.retry(1, &StatusError(400)).is_none());
    }

    #[test]
    fn test_stop_retrier() {
        let err = TransportError::Connection("refused".to_string());
        assert!(Retrier::<TransportError>::retry(&StopRetrier, 1, &err).is_none());
    }
}
