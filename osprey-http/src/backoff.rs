//! Backoff policies.
//!
//! A policy maps the number of failed attempts so far to the time to wait
//! before the next attempt, or to `None` when retrying should stop. Policies
//! are stateless: the retry executor owns the attempt counter, so one policy
//! value can be shared by any number of concurrent operations.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Strategy deciding how long to wait before retry number `retry`.
///
/// `retry` starts at 1 for the first retry (i.e. after the first failure).
pub trait Backoff: Send + Sync {
    /// Wait before the next attempt, or `None` to stop retrying.
    fn next(&self, retry: u32) -> Option<Duration>;
}

impl<B: Backoff + ?Sized> Backoff for &B {
    fn next(&self, retry: u32) -> Option<Duration> {
        (**self).next(retry)
    }
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    fn next(&self, retry: u32) -> Option<Duration> {
        (**self).next(retry)
    }
}

impl<B: Backoff + ?Sized> Backoff for Arc<B> {
    fn next(&self, retry: u32) -> Option<Duration> {
        (**self).next(retry)
    }
}

/// Retry immediately, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroBackoff;

impl Backoff for ZeroBackoff {
    fn next(&self, _retry: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopBackoff;

impl Backoff for StopBackoff {
    fn next(&self, _retry: u32) -> Option<Duration> {
        None
    }
}

/// Retry forever with a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff {
    interval: Duration,
}

impl ConstantBackoff {
    /// Create a constant backoff.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Backoff for ConstantBackoff {
    fn next(&self, _retry: u32) -> Option<Duration> {
        Some(self.interval)
    }
}

/// Walks through an explicit list of waits and stops when the list runs out.
///
/// With jitter enabled each wait `w` is replaced by a random value in
/// `[w/2, 3w/2)`.
#[derive(Debug, Clone)]
pub struct SimpleBackoff {
    ticks: Vec<Duration>,
    jitter: bool,
}

impl SimpleBackoff {
    /// Create a simple backoff from a list of waits.
    pub fn new(ticks: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
            jitter: false,
        }
    }

    /// Create a simple backoff from a list of waits in milliseconds.
    pub fn from_millis(ticks: &[u64]) -> Self {
        Self::new(ticks.iter().copied().map(Duration::from_millis))
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Backoff for SimpleBackoff {
    fn next(&self, retry: u32) -> Option<Duration> {
        let index = (retry as usize).checked_sub(1)?;
        let tick = *self.ticks.get(index)?;
        if !self.jitter {
            return Some(tick);
        }
        let millis = tick.as_millis() as u64;
        if millis == 0 {
            return Some(Duration::ZERO);
        }
        let jittered = millis / 2 + rand::rng().random_range(0..millis);
        Some(Duration::from_millis(jittered))
    }
}

/// Exponential backoff with jitter.
///
/// The wait for retry `n` is `r * initial * 2^n` with `r` uniform in
/// `[1, 2)`. Once the computed wait reaches `max` the policy stops, so `max`
/// bounds both the wait and, indirectly, the number of retries.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    /// Create an exponential backoff doubling from `initial` until `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            factor: 2.0,
        }
    }

    /// Set the growth factor (2.0 by default).
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// The initial wait.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// The wait at which the policy gives up.
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(8))
    }
}

impl Backoff for ExponentialBackoff {
    fn next(&self, retry: u32) -> Option<Duration> {
        let r = 1.0 + rand::rng().random::<f64>();
        let initial = self.initial.as_millis() as f64;
        let max = self.max.as_millis() as f64;
        let millis = (r * initial * self.factor.powi(retry as i32)).min(max);
        if millis >= max {
            return None;
        }
        Some(Duration::from_millis(millis as u64))
    }
}

/// Stops an inner policy after a fixed number of retries.
#[derive(Debug, Clone)]
pub struct MaxRetries<B> {
    inner: B,
    max_retries: u32,
}

impl<B: Backoff> Backoff for MaxRetries<B> {
    fn next(&self, retry: u32) -> Option<Duration> {
        if retry > self.max_retries {
            return None;
        }
        self.inner.next(retry)
    }
}

/// Clamps every wait of an inner policy to an upper bound.
#[derive(Debug, Clone)]
pub struct Capped<B> {
    inner: B,
    max: Duration,
}

impl<B: Backoff> Backoff for Capped<B> {
    fn next(&self, retry: u32) -> Option<Duration> {
        self.inner.next(retry).map(|wait| wait.min(self.max))
    }
}

/// Combinators available on every policy.
pub trait BackoffExt: Backoff + Sized {
    /// Allow at most `max_retries` retries (so `max_retries + 1` attempts).
    fn with_max_retries(self, max_retries: u32) -> MaxRetries<Self> {
        MaxRetries {
            inner: self,
            max_retries,
        }
    }

    /// Never wait longer than `max` between attempts.
    fn capped(self, max: Duration) -> Capped<Self> {
        Capped { inner: self, max }
    }
}

impl<B: Backoff + Sized> BackoffExt for B {}
