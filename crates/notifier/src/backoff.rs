//! Exponential backoff schedule for failed submissions.

use std::time::Duration;

use tokio::time::Instant;

/// Exponent cap; keeps the multiplier well inside `u32`.
const MAX_EXPONENT: u32 = 20;

/// Minimum wait after the `attempts`-th failure: `base * 2^(attempts-1)`.
///
/// Zero attempts means the entry has never been tried and needs no wait.
pub fn retry_delay(base: Duration, attempts: u32) -> Duration {
    if attempts == 0 {
        return Duration::ZERO;
    }
    let exp = (attempts - 1).min(MAX_EXPONENT);
    base.saturating_mul(1u32 << exp)
}

/// Whether an entry scheduled at `enqueued_at` may be submitted at `now`.
///
/// Fresh entries (`attempts == 0`) are always due so that the first
/// submission is immediate.
pub fn is_due(enqueued_at: Instant, attempts: u32, base: Duration, now: Instant) -> bool {
    if attempts == 0 {
        return true;
    }
    now.saturating_duration_since(enqueued_at) >= retry_delay(base, attempts)
}
