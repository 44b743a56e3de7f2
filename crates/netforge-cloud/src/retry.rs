//! Bounded retry with exponential backoff
//!
//! Cloud describe calls issued right after a create may not see the new
//! resource yet. The harness retries an operation while its error is
//! classified retryable by the caller, sleeping an exponentially growing,
//! jittered delay between attempts, and gives up after a bounded number
//! of attempts. Non-retryable errors and budget exhaustion return the
//! last error untouched.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff schedule for one retried operation.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub initial_delay: Duration,

    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,

    /// Growth factor applied per attempt.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Schedule for operations that legitimately take minutes, like a NAT
    /// gateway becoming available.
    pub fn slow() -> Self {
        Self {
            max_attempts: 30,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 1.5,
        }
    }

    /// Undecorated delay before attempt `attempt + 1` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error,
/// or exhausts the attempt budget.
pub async fn retry_with_backoff<T, E, Op, Fut, Retryable>(
    policy: &BackoffPolicy,
    retryable: Retryable,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Retryable: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < policy.max_attempts && retryable(&err) => {
                let delay = jittered(policy.delay_for_attempt(attempt));
                tracing::debug!(
                    "attempt {}/{} failed ({err}), retrying in {:?}",
                    attempt + 1,
                    policy.max_attempts,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Scale a delay by a factor in [0.5, 1.0) so concurrent retriers spread
/// out instead of stampeding.
fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.0);
    delay.mul_f64(factor)
}
