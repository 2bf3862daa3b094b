use std::time::Duration;

use backoff::ExponentialBackoff;
use ratchet_model::ErrorKind as BackendErrorKind;

use crate::tool;

/// Controls how failed backend calls and tool invocations are retried.
///
/// The policy is immutable for the lifetime of one loop invocation. The
/// delay before retry `n` is `base_delay * multiplier^(n-1)`, and every
/// delay is capped by the remaining time budget of the run.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the initial one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after every retry.
    pub multiplier: f64,
    /// Backend error kinds that are worth retrying.
    pub retryable_backend: Vec<BackendErrorKind>,
    /// Tool error kinds that are worth retrying.
    pub retryable_tools: Vec<tool::ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            retryable_backend: vec![
                BackendErrorKind::RateLimited,
                BackendErrorKind::Unavailable,
                BackendErrorKind::Timeout,
            ],
            retryable_tools: vec![tool::ErrorKind::Transient],
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub(crate) fn retries_backend(&self, kind: BackendErrorKind) -> bool {
        self.retryable_backend.contains(&kind)
    }

    #[inline]
    pub(crate) fn retries_tool(&self, kind: tool::ErrorKind) -> bool {
        self.retryable_tools.contains(&kind)
    }

    /// Builds the exponential schedule for one operation, capped by the
    /// remaining time budget. Attempt capping is handled by callers since
    /// the schedule itself only bounds elapsed time.
    pub(crate) fn schedule(&self, remaining: Duration) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: remaining,
            max_elapsed_time: Some(remaining),
            ..ExponentialBackoff::default()
        }
    }
}
