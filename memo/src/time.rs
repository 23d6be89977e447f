use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for entry timestamps.
// It is initialized lazily on its first use.
static MEMO_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds elapsed since the epoch, as stored on entries.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  saturating_nanos(Instant::now().saturating_duration_since(*MEMO_EPOCH))
}

/// Converts a duration to nanoseconds, clamping instead of overflowing.
#[inline]
pub(crate) fn saturating_nanos(duration: Duration) -> u64 {
  u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Returns `true` once at least `window` has passed since `since`.
#[inline]
pub(crate) fn has_elapsed(now: u64, since: u64, window: Duration) -> bool {
  now.saturating_sub(since) >= saturating_nanos(window)
}
