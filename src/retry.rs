//! Opt-in retries for callers. The core client never retries on its own.

use std::{future::Future, num::NonZeroUsize, time::Duration};

use tokio::time::sleep;

use crate::error::Error;

mod api;
pub use api::RequestRetryExt;

/// When and how long to wait before repeating a failed call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts including the first call; `None` keeps retrying.
    pub max_attempts: Option<NonZeroUsize>,
    pub initial_backoff: Duration,
    /// Cap for both the exponential backoff and a server `retryAfterSeconds`.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Wait for the server's `retryAfterSeconds` instead of the backoff step.
    pub honor_retry_after: bool,
    pub is_retryable: fn(&Error) -> bool,
}

impl RetryPolicy {
    pub fn attempts(mut self, max_attempts: NonZeroUsize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn unlimited(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Growth factor between waits, clamped to at least `1.0`.
    pub fn multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier.max(1.0);
        self
    }

    pub fn honor_retry_after(mut self, honor: bool) -> Self {
        self.honor_retry_after = honor;
        self
    }

    pub fn retry_if(mut self, is_retryable: fn(&Error) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }
}

impl Default for RetryPolicy {
    /// Five attempts, 200ms doubling up to 5s, transient errors only.
    fn default() -> Self {
        Self {
            max_attempts: NonZeroUsize::new(5),
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            honor_retry_after: true,
            is_retryable: Error::is_transient,
        }
    }
}

/// Attempt bookkeeping for one retried operation.
#[derive(Debug)]
pub(crate) struct Attempts<'p> {
    policy: &'p RetryPolicy,
    made: usize,
    backoff: Duration,
}

impl<'p> Attempts<'p> {
    pub(crate) fn new(policy: &'p RetryPolicy) -> Self {
        Attempts {
            policy,
            made: 0,
            backoff: policy.initial_backoff.min(policy.max_backoff),
        }
    }

    pub(crate) fn made(&self) -> usize {
        self.made
    }

    /// Count an attempt; false once the policy's cap is reached.
    pub(crate) fn take(&mut self) -> bool {
        self.made = self.made.saturating_add(1);
        self.policy
            .max_attempts
            .is_none_or(|max| self.made < max.get())
    }

    /// Count a failed attempt and return the wait before the next one, or
    /// `None` when `error` is final.
    pub(crate) fn after_failure(&mut self, error: &Error) -> Option<Duration> {
        if !self.take() || !(self.policy.is_retryable)(error) {
            return None;
        }
        let step = self.backoff;
        self.backoff = step
            .mul_f64(self.policy.backoff_multiplier.max(1.0))
            .min(self.policy.max_backoff);
        let wait = error
            .retry_after()
            .filter(|_| self.policy.honor_retry_after)
            .map_or(step, |after| after.min(self.policy.max_backoff));
        Some(wait)
    }

    /// Start counting again, e.g. after a call made progress.
    pub(crate) fn reset(&mut self) {
        *self = Attempts::new(self.policy);
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error or
/// runs out of attempts.
pub async fn retry_with_policy<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempts = Attempts::new(policy);
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match attempts.after_failure(&error) {
                Some(wait) => {
                    tracing::warn!(attempt = attempts.made(), ?wait, error = %error, "retrying request");
                    sleep(wait).await;
                }
                None => return Err(error),
            },
        }
    }
}
