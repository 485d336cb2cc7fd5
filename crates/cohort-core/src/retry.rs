//! Bounded retry with exponential backoff

use std::time::Duration;

/// Errors that can tell whether another attempt may succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2500),
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts.
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    /// base, 2*base, 4*base, ...
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `attempt_fn` until it succeeds, fails with a non-retryable error,
    /// or the budget is spent.
    ///
    /// The closure receives the attempt number (0 for the first call) so the
    /// caller can switch to a refreshing request on retries.
    pub fn run<T, E>(&self, label: &str, mut attempt_fn: impl FnMut(u32) -> Result<T, E>) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match attempt_fn(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    attempt += 1;
                    log::debug!(
                        "{label}: attempt {attempt}/{} failed: {e}, retrying...",
                        self.max_retries
                    );
                    let delay = self.backoff_duration(attempt);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flaky(bool);

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    #[test]
    fn backoff_exponential() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::immediate(3);
        let mut seen = Vec::new();
        let out = policy.run("test", |attempt| {
            seen.push(attempt);
            if attempt < 2 { Err(Flaky(true)) } else { Ok(attempt) }
        });
        assert_eq!(out.unwrap(), 2);
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn gives_up_after_budget() {
        let policy = RetryPolicy::immediate(2);
        let mut calls = 0;
        let out: Result<(), _> = policy.run("test", |_| {
            calls += 1;
            Err(Flaky(true))
        });
        assert!(out.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_retryable_stops_immediately() {
        let policy = RetryPolicy::immediate(5);
        let mut calls = 0;
        let out: Result<(), _> = policy.run("test", |_| {
            calls += 1;
            Err(Flaky(false))
        });
        assert!(out.is_err());
        assert_eq!(calls, 1);
    }
}
