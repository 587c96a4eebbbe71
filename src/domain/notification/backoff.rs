//! Exponential reconnect backoff.

use std::time::Duration;

/// Delay before reconnect attempt `attempt` (zero based).
///
/// `min(initial * 2^attempt, max)`, computed exactly in nanoseconds. Only a
/// product too large for `u128` saturates to `max`. No jitter; callers that
/// want it add their own.
pub fn retry_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    if initial.is_zero() {
        return Duration::ZERO;
    }

    let scaled = 1u128
        .checked_shl(attempt)
        .and_then(|factor| initial.as_nanos().checked_mul(factor));

    match scaled {
        Some(nanos) if nanos < max.as_nanos() => from_nanos(nanos),
        _ => max,
    }
}

/// `nanos` is below some `Duration`'s total, so the seconds fit in `u64`.
fn from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    Duration::new((nanos / NANOS_PER_SEC) as u64, (nanos % NANOS_PER_SEC) as u32)
}

/// Initial delay and cap of an exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Creates a policy. `initial` should not exceed `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay for the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        retry_delay(attempt, self.initial, self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_000), Duration::from_millis(30_000))
    }
}
