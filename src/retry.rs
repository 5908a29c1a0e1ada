//! Bounded retry with exponential backoff and jitter.
//!
//! The geocoding service rate-limits its clients and occasionally times out,
//! so lookups are wrapped in a small retry loop that only repeats
//! transient failures.

use rand::prelude::*;
use std::time::Duration;

/// Exponential backoff with additive random jitter.
///
/// The pause after attempt `i` (0-indexed) is `base * 2^i + jitter * u`
/// where `u` is drawn uniformly from `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay unit doubled on every attempt
    pub base: Duration,
    /// Upper bound of the random offset added to each delay
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            base: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits. Useful for offline backends and tests.
    pub fn none() -> Self {
        BackoffPolicy {
            base: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay to wait after the attempt with index `attempt` failed.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponential = self.base.mul_f64(2f64.powi(attempt as i32));
        let offset = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rng.gen_range(0.0..1.0))
        };
        exponential + offset
    }
}

/// Run `op` up to `max_attempts` times.
///
/// `op` receives the 0-based attempt index. An error for which `is_transient`
/// returns false ends the loop immediately. Between two attempts `pause` is
/// called with the index of the attempt that just failed; it is never called
/// after the final attempt. The last error is returned when all attempts fail.
pub fn retry<T, E, F, P, W>(max_attempts: u32, mut op: F, is_transient: P, mut pause: W) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    P: Fn(&E) -> bool,
    W: FnMut(u32),
{
    let attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_transient(&e) || attempt + 1 >= attempts {
                    return Err(e);
                }
                pause(attempt);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    #[derive(Debug, PartialEq)]
    enum Failure {
        Transient,
        Fatal,
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let mut pauses = Vec::new();

        let result: Result<(), Failure> = retry(
            3,
            |_| {
                calls += 1;
                Err(Failure::Transient)
            },
            |e| *e == Failure::Transient,
            |i| pauses.push(i),
        );

        assert_eq!(result, Err(Failure::Transient));
        assert_eq!(calls, 3);
        assert_eq!(pauses, vec![0, 1]);
    }

    #[test]
    fn test_stops_on_success() {
        let mut calls = 0;

        let result = retry(
            3,
            |attempt| {
                calls += 1;
                if attempt == 0 { Err(Failure::Transient) } else { Ok(attempt) }
            },
            |e| *e == Failure::Transient,
            |_| {},
        );

        assert_eq!(result, Ok(1));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let mut calls = 0;
        let mut paused = false;

        let result: Result<(), Failure> = retry(
            3,
            |_| {
                calls += 1;
                Err(Failure::Fatal)
            },
            |e| *e == Failure::Transient,
            |_| paused = true,
        );

        assert_eq!(result, Err(Failure::Fatal));
        assert_eq!(calls, 1);
        assert!(!paused);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let mut calls = 0;
        let _: Result<(), Failure> = retry(0, |_| { calls += 1; Err(Failure::Transient) }, |_| true, |_| {});
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_backoff_grows_exponentially_within_jitter() {
        let policy = BackoffPolicy::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for attempt in 0..4 {
            let delay = policy.delay(attempt, &mut rng).as_secs_f64();
            let floor = 2f64.powi(attempt as i32);
            assert!(delay >= floor && delay < floor + 1.0, "attempt {}: {}", attempt, delay);
        }
    }

    #[test]
    fn test_no_backoff_is_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(BackoffPolicy::none().delay(5, &mut rng), Duration::ZERO);
    }
}
