// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::time::Duration;

use crate::constant::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_BACKOFF_MS,
};
use crate::pl::annotate::AnnotationError;

/// Bounded exponential backoff for transient annotation failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

/// Result of a retried call and the number of attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, AnnotationError>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Policy that retries without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based)
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use cellrun_core::pl::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay(1), Duration::from_secs(1));
    /// assert_eq!(policy.delay(2), Duration::from_secs(2));
    /// assert_eq!(policy.delay(10), Duration::from_secs(30));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let seconds = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);

        if !seconds.is_finite() || seconds >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }

        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// Call `op` until it succeeds, fails permanently or attempts run out
    ///
    /// Only transient errors are retried. `on_retry` is told the failed
    /// attempt number, the error and the delay before the next attempt.
    pub fn run<T, F, R>(&self, mut op: F, mut on_retry: R) -> Attempted<T>
    where
        F: FnMut(u32) -> Result<T, AnnotationError>,
        R: FnMut(u32, &AnnotationError, Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay(attempt);
                    on_retry(attempt, &err, delay);

                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }

                    attempt += 1;
                }
                result => {
                    return Attempted {
                        result,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
