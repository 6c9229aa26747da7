//! Retrying of rate-limited provider requests with exponential backoff.

use std::time::Duration;

use tracing::{error, warn};

use crate::{api::ApiError, poller::Clock};

/// Configuration for requests which may be rate limited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Upper bound for the delay, which doubles after every attempt.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// Returns the delay to wait after `attempt` (starting at one) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Calls `request` until it succeeds, fails with anything but [`ApiError::RateLimited`], or
/// `config.max_attempts` is exhausted, in which case the last error is returned.
pub fn retry_rate_limited<T, F>(
    clock: &dyn Clock,
    config: &RetryConfig,
    description: &str,
    mut request: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Result<T, ApiError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match request() {
            Ok(result) => return Ok(result),
            Err(err) if err.is_rate_limited() && attempt < max_attempts => {
                let delay = config.delay_after(attempt);
                warn!(
                    description,
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis(),
                    "request was rate limited, retrying"
                );
                clock.sleep(delay);
            }
            Err(err) => {
                if err.is_rate_limited() {
                    error!(description, attempt, error = %err, "request still rate limited, giving up");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rstest::rstest;

    use super::*;
    use crate::{
        api::{ProviderSnafu, RateLimitedSnafu},
        poller::clock::tests::ManualClock,
    };

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn succeeds_immediately() {
        let clock = ManualClock::new();
        let result = retry_rate_limited(&clock, &config(3), "op", || Ok(42));
        assert_eq!(result, Ok(42));
        assert!(clock.sleeps.borrow().is_empty());
    }

    #[test]
    fn succeeds_after_rate_limits() {
        let clock = ManualClock::new();
        let calls = Cell::new(0);

        let result = retry_rate_limited(&clock, &config(3), "op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                RateLimitedSnafu { message: "quota" }.fail()
            } else {
                Ok(42)
            }
        });

        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
        assert_eq!(
            *clock.sleeps.borrow(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn exhausts_max_attempts() {
        let clock = ManualClock::new();
        let calls = Cell::new(0);

        let result: Result<(), _> = retry_rate_limited(&clock, &config(2), "op", || {
            calls.set(calls.get() + 1);
            RateLimitedSnafu { message: "quota" }.fail()
        });

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let clock = ManualClock::new();
        let calls = Cell::new(0);

        let result: Result<(), _> = retry_rate_limited(&clock, &config(5), "op", || {
            calls.set(calls.get() + 1);
            ProviderSnafu {
                code: 3,
                message: "invalid argument",
            }
            .fail()
        });

        assert!(matches!(result, Err(ApiError::Provider { code: 3, .. })));
        assert_eq!(calls.get(), 1);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(4, 5)]
    #[case(40, 5)]
    fn delay_is_capped(#[case] attempt: u32, #[case] secs: u64) {
        assert_eq!(config(10).delay_after(attempt), Duration::from_secs(secs));
    }
}
