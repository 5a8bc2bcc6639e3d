use std::{fmt, future::Future, pin::Pin, time::Duration};

use rand::Rng;

use crate::{
    options::{DEFAULT_BACKOFF_DELAY_FACTOR, DEFAULT_BACKOFF_MAX_DELAY, DEFAULT_BACKOFF_MIN_DELAY},
    ClientOptions,
};

/// Jittered exponential backoff bounded by a retry budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    min_delay: Duration,
    max_delay: Duration,
    factor: f64,
    max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_MIN_DELAY,
            DEFAULT_BACKOFF_MAX_DELAY,
            DEFAULT_BACKOFF_DELAY_FACTOR,
            0,
        )
    }
}

impl BackoffPolicy {
    /// Builds a policy. Zero delays and non-positive factors fall back to
    /// the defaults; `max_delay` is raised to `min_delay` when lower.
    pub fn new(min_delay: Duration, max_delay: Duration, factor: f64, max_retries: u32) -> Self {
        let min_delay = if min_delay.is_zero() {
            DEFAULT_BACKOFF_MIN_DELAY
        } else {
            min_delay
        };
        let max_delay = if max_delay.is_zero() {
            DEFAULT_BACKOFF_MAX_DELAY
        } else {
            max_delay
        };
        let factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            DEFAULT_BACKOFF_DELAY_FACTOR
        };

        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            factor,
            max_retries,
        }
    }

    pub(crate) fn from_options(options: &ClientOptions) -> Self {
        Self::new(
            options.backoff_min_delay,
            options.backoff_max_delay,
            options.backoff_delay_factor,
            options.max_retries,
        )
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay for `attempt` given a jitter sample in `[0.5, 1.0]`.
    ///
    /// `min * factor^attempt` is clamped to `[min, max]`, then the span above
    /// `min` is scaled by `jitter`.
    pub fn compute_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let min = self.min_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = min * self.factor.powi(exponent);
        let clamped = if raw.is_nan() { max } else { raw.clamp(min, max) };
        let jitter = jitter.clamp(0.5, 1.0);

        let delay = min + jitter * (clamped - min);
        // f64 rounding near `Duration::MAX` can overshoot the representable range.
        Duration::try_from_secs_f64(delay)
            .unwrap_or(self.max_delay)
            .clamp(self.min_delay, self.max_delay)
    }

    /// Randomized delay for `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.compute_delay(attempt, jitter)
    }

    /// Delay before retrying after `attempt` failed, or `None` once the
    /// retry budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_retries {
            return None;
        }
        Some(self.delay_for(attempt))
    }
}

/// Suspends the retry loop between attempts.
pub trait Sleeper: fmt::Debug + Send + Sync {
    fn sleep(&self, delay: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(delay))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::BackoffPolicy;

    fn policy(max_retries: u32) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(4),
            Duration::from_secs(60),
            3.0,
            max_retries,
        )
    }

    #[test]
    fn delay_stays_within_bounds() {
        let policy = policy(100);
        for attempt in 0..64 {
            for _ in 0..8 {
                let delay = policy.delay_for(attempt);
                assert!(delay >= policy.min_delay(), "attempt {attempt}: {delay:?}");
                assert!(delay <= policy.max_delay(), "attempt {attempt}: {delay:?}");
            }
        }
    }

    #[test]
    fn delay_is_non_decreasing_for_fixed_jitter() {
        let policy = policy(100);
        for jitter in [0.5, 0.75, 1.0] {
            let mut previous = Duration::ZERO;
            for attempt in 0..20 {
                let delay = policy.compute_delay(attempt, jitter);
                assert!(delay >= previous, "attempt {attempt} jitter {jitter}");
                previous = delay;
            }
        }
    }

    #[test]
    fn compute_delay_matches_formula() {
        let policy = policy(10);
        // 4 * 3^1 = 12, span above min is 8, half of it is 4.
        assert_eq!(policy.compute_delay(1, 0.5), Duration::from_secs(8));
        assert_eq!(policy.compute_delay(1, 1.0), Duration::from_secs(12));
        // 4 * 3^4 = 324 is clamped to 60.
        assert_eq!(policy.compute_delay(4, 1.0), Duration::from_secs(60));
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let policy = BackoffPolicy::new(Duration::ZERO, Duration::ZERO, 0.0, 1);
        assert_eq!(policy, self::policy(1));
    }

    #[test]
    fn max_below_min_is_raised() {
        let policy = BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(2), 2.0, 1);
        assert_eq!(policy.max_delay(), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(10));
    }

    #[test]
    fn huge_max_delay_does_not_overflow() {
        let policy = BackoffPolicy::new(Duration::from_secs(4), Duration::MAX, 3.0, 100);
        assert_eq!(policy.compute_delay(60, 1.0), Duration::MAX);
        let delay = policy.compute_delay(60, 0.5);
        assert!(delay >= policy.min_delay() && delay <= policy.max_delay());
        assert_eq!(policy.compute_delay(0, 1.0), Duration::from_secs(4));
    }

    #[test]
    fn budget_allows_exactly_max_retries() {
        let policy = policy(2);
        assert!(policy.next_delay(1).is_some());
        assert!(policy.next_delay(2).is_some());
        assert!(policy.next_delay(3).is_none());
        assert!(BackoffPolicy::default().next_delay(1).is_none());
    }
}
