//! Backoff for the enclosing reconcile loop
//!
//! The ensure operations never retry on their own. A caller that wants
//! another pass after a transient failure (a conflict on update, an
//! unreachable API server) re-runs the whole operation through
//! [`retry_with_backoff`]; every step is idempotent so this is safe.
//!
//! ```ignore
//! use psp_reconciler::retry::{retry_with_backoff, RetryConfig};
//!
//! retry_with_backoff(&RetryConfig::with_max_attempts(5), "ensure_all", || {
//!     psp_reconciler::ensure_all(&descriptor, &store)
//! })
//! .await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Backoff settings for re-running a reconciliation pass
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of passes (0 = retry forever)
    pub max_attempts: u32,
    /// Delay before the second pass
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor applied after every failed pass
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of passes
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay that follows `delay` after another failure, capped at `max_delay`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Scale `delay` by a random factor in `[0.5, 1.5)`
fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Run `operation` until it succeeds or the attempts are used up
///
/// Returns the last error once `max_attempts` passes have failed.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if config.exhausted(attempt) {
            error!(
                operation = %operation_name,
                attempt,
                error = %err,
                "reconciliation failed, giving up"
            );
            return Err(err);
        }

        let wait = jitter(delay);
        warn!(
            operation = %operation_name,
            attempt,
            error = %err,
            delay_ms = wait.as_millis() as u64,
            "reconciliation failed, retrying"
        );
        tokio::time::sleep(wait).await;
        delay = config.next_delay(delay);
    }
}
