//! Bounded exponential backoff around a fallible async call.

use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::warn;

/// Attempt budget plus exponential wait clamped into `[floor, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Seconds multiplied by `2^(attempt - 1)` before clamping.
    pub multiplier: f64,
    pub floor: Duration,
    pub ceiling: Duration,
    /// Draw each wait uniformly from `[computed, ceiling]` instead.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1.0,
            floor: Duration::from_secs(5),
            ceiling: Duration::from_secs(7),
            jitter: false,
        }
    }
}

/// Every attempt failed; carries the last error.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    /// Policy that retries without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            multiplier: 0.0,
            floor: Duration::ZERO,
            ceiling: Duration::ZERO,
            jitter: false,
        }
    }

    /// Deterministic wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1).min(62) as i32);
        let secs = self.multiplier * exp;
        let raw = if secs.is_finite() && secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(self.ceiling)
        } else {
            Duration::ZERO
        };
        raw.min(self.ceiling).max(self.floor)
    }

    fn wait_for(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter && self.ceiling > base {
            rand::thread_rng().gen_range(base..=self.ceiling)
        } else {
            base
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: err,
                    })
                }
                Err(err) => {
                    let wait = self.wait_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        ?wait,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
