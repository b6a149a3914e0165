//! Bounded fixed-interval polling shared by the worker readiness and
//! model discovery loops.
//!
//! Both loops have the same shape: run an attempt, and if it comes up
//! empty, sleep a fixed interval and try again until an overall
//! deadline is spent or the [`CancellationToken`] is triggered. The
//! attempt closure owns its own per-attempt error handling; a failed
//! attempt simply yields `None`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Tunable parameters for a bounded poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between attempts.
    pub interval: Duration,
    /// Overall budget across all attempts.
    pub deadline: Duration,
}

impl PollConfig {
    /// Maximum number of attempts the loop will make: the deadline
    /// divided by the interval, rounded up, never less than one.
    pub fn max_attempts(&self) -> u32 {
        let interval_ms = self.interval.as_millis().max(1);
        let deadline_ms = self.deadline.as_millis();
        let attempts = deadline_ms.div_ceil(interval_ms).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

/// Outcome of a bounded poll loop.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// An attempt produced a value.
    Ready(T),
    /// Every attempt inside the budget came up empty.
    DeadlineExceeded {
        /// How many attempts were made.
        attempts: u32,
    },
    /// The cancellation token fired before an attempt succeeded.
    Cancelled,
}

/// Run `attempt` at a fixed interval until it yields a value, the
/// attempt budget is spent, or `cancel` fires.
///
/// The first attempt runs immediately; the sleep comes between
/// attempts, not after the last one. `attempt` receives the 1-based
/// attempt number.
pub async fn poll_until<T, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut attempt: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let max_attempts = config.max_attempts();

    for n in 1..=max_attempts {
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            result = attempt(n) => {
                if let Some(value) = result {
                    return PollOutcome::Ready(value);
                }
            }
        }

        if n < max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    PollOutcome::DeadlineExceeded {
        attempts: max_attempts,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
