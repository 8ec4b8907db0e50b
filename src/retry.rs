//! Retry strategies for transient failures.
//!
//! Which failures are transient is decided by [`ApiError::is_retryable`]
//! (server errors and network errors). The strategy only decides how many
//! more attempts are made and how long to wait before each one.
//!
//! [`ApiError::is_retryable`]: crate::ApiError::is_retryable

use rand::Rng;
use std::time::Duration;

/// Delay used when a call asks for retries without naming a delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Defines how many times and how far apart failed requests are retried.
///
/// The default is a constant one second delay with no retries; calls opt in
/// through [`RequestOptions::retries`](crate::RequestOptions::retries).
///
/// # Examples
///
/// ```
/// use resilient_client::RetryStrategy;
/// use std::time::Duration;
///
/// // Constant delay: 250ms, 250ms, 250ms
/// let constant = RetryStrategy::Linear {
///     delay: Duration::from_millis(250),
///     max_retries: 3,
/// };
///
/// // Exponential backoff: 100ms, 200ms, 400ms...
/// let exponential = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(30),
///     max_retries: 5,
///     jitter: true,
/// };
/// ```
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// Do not retry failed requests.
    None,

    /// Retry with a fixed delay between attempts.
    Linear {
        /// The delay between retry attempts.
        delay: Duration,
        /// The maximum number of retry attempts.
        max_retries: usize,
    },

    /// Retry with exponentially increasing delays.
    ///
    /// Each retry waits for `initial_delay * 2^(attempt - 1)` (capped at
    /// `max_delay`). Jitter scales each delay to 50–100% of its value.
    ExponentialBackoff {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// The maximum number of retry attempts.
        max_retries: usize,
        /// Whether to add random jitter to delays.
        jitter: bool,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Linear {
            delay: DEFAULT_RETRY_DELAY,
            max_retries: 0,
        }
    }
}

impl RetryStrategy {
    /// Returns the delay before the given retry, or `None` if retries are exhausted.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The retry number (1-indexed, so 1 = first retry)
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::Linear { delay, max_retries } => {
                if attempt > *max_retries {
                    None
                } else {
                    Some(*delay)
                }
            }
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if attempt > *max_retries {
                    return None;
                }

                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1) as u32);
                let base_delay =
                    initial_delay.saturating_mul(multiplier.try_into().unwrap_or(u32::MAX));
                let delay = base_delay.min(*max_delay);

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(jitter_factor))
                } else {
                    Some(delay)
                }
            }
        }
    }

    /// Applies per-call `retries` / `retry_delay` overrides.
    ///
    /// The shape of the strategy is kept: a linear strategy stays linear and an
    /// exponential one stays exponential with `retry_delay` as its initial
    /// delay. `None` cannot express a count, so an explicit `retries` turns it
    /// into a linear strategy.
    pub fn with_overrides(&self, retries: Option<usize>, retry_delay: Option<Duration>) -> Self {
        if retries.is_none() && retry_delay.is_none() {
            return self.clone();
        }

        match self {
            RetryStrategy::Linear { delay, max_retries } => RetryStrategy::Linear {
                delay: retry_delay.unwrap_or(*delay),
                max_retries: retries.unwrap_or(*max_retries),
            },
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => RetryStrategy::ExponentialBackoff {
                initial_delay: retry_delay.unwrap_or(*initial_delay),
                max_delay: *max_delay,
                max_retries: retries.unwrap_or(*max_retries),
                jitter: *jitter,
            },
            RetryStrategy::None => match retries {
                Some(max_retries) => RetryStrategy::Linear {
                    delay: retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
                    max_retries,
                },
                None => self.clone(),
            },
        }
    }
}
