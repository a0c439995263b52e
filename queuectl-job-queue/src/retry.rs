//! Retry and dead-letter decisions.

use std::time::Duration;

use crate::settings::QueueSettings;

/// What happens to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to `pending`, eligible again after `delay`.
    Retry { delay: Duration },
    /// Budget exhausted; move to the dead letter queue.
    DeadLetter,
}

/// Exponential backoff with a retry budget.
///
/// A job may fail `max_retries` times and still be retried; the failure that
/// pushes `attempts` past `max_retries` dead-letters it. The n-th retry waits
/// `backoff_base^n` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: u32,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, backoff_base: u32) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Policy for one job: its own `max_retries` override wins over the queue setting.
    pub fn for_job(settings: &QueueSettings, job_max_retries: Option<u32>) -> Self {
        Self::new(
            job_max_retries.unwrap_or(settings.max_retries),
            settings.backoff_base,
        )
    }

    /// `attempts` counts the failure being decided on.
    pub fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts > self.max_retries {
            RetryDecision::DeadLetter
        } else {
            RetryDecision::Retry {
                delay: self.backoff(attempts),
            }
        }
    }

    /// `backoff_base^attempts` seconds, saturating instead of overflowing.
    pub fn backoff(&self, attempts: u32) -> Duration {
        Duration::from_secs(u64::from(self.backoff_base).saturating_pow(attempts))
    }
}
