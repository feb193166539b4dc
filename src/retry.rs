//! Retry policy for timed out requests

use std::time::Duration;
use log::debug;

pub const MAX_ATTEMPTS: usize = 3;

/// Retry policy for requests that time out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy
{   pub max_attempts: usize
  , pub backoff_factor: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      max_attempts: usize
    , backoff_factor: Duration
    ) -> Self
    {   RetryPolicy
        {   max_attempts: max_attempts.max(1)
          , backoff_factor
        }
    }

    pub fn from_config(config: &crate::Config) -> Self
    {   RetryPolicy::new(
          MAX_ATTEMPTS
        , Duration::from_secs(config.retry_delay_secs)
        )
    }

    /// Sleep after the 1-based `attempt` timed out:
    /// `backoff_factor * attempt`.
    pub fn delay_after(
      &self
    , attempt: usize
    ) -> Duration
    {   debug!("Calculating backoff for attempt {}", attempt);
        self.backoff_factor
          .saturating_mul(attempt.min(u32::MAX as usize) as u32)
    }

    /// Whether another attempt follows the 1-based `attempt`.
    pub fn has_next(&self, attempt: usize) -> bool
    {   attempt < self.max_attempts
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::new(MAX_ATTEMPTS, Duration::from_secs(2))
    }
}
