use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

use crate::time;

/// Lock-free statistics counters owned by one cache.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  load_successes: CachePadded<AtomicU64>,
  load_exceptions: CachePadded<AtomicU64>,
  total_load_nanos: CachePadded<AtomicU64>,
  evictions: CachePadded<AtomicU64>,
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_load_success(&self, elapsed: Duration) {
    self.load_successes.fetch_add(1, Ordering::Relaxed);
    self
      .total_load_nanos
      .fetch_add(time::saturating_nanos(elapsed), Ordering::Relaxed);
  }

  pub(crate) fn record_load_exception(&self, elapsed: Duration) {
    self.load_exceptions.fetch_add(1, Ordering::Relaxed);
    self
      .total_load_nanos
      .fetch_add(time::saturating_nanos(elapsed), Ordering::Relaxed);
  }

  pub(crate) fn record_evictions(&self, count: u64) {
    if count > 0 {
      self.evictions.fetch_add(count, Ordering::Relaxed);
    }
  }

  /// Creates a point-in-time snapshot of the current counters.
  pub(crate) fn snapshot(&self) -> CacheStats {
    CacheStats {
      hit_count: self.hits.load(Ordering::Relaxed),
      miss_count: self.misses.load(Ordering::Relaxed),
      load_success_count: self.load_successes.load(Ordering::Relaxed),
      load_exception_count: self.load_exceptions.load(Ordering::Relaxed),
      total_load_time: self.total_load_nanos.load(Ordering::Relaxed),
      eviction_count: self.evictions.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time copy of one cache's counters.
///
/// A hit is a read that found a live value, a miss one that did not (including
/// callers that waited for another caller's load). Loads are counted once per
/// loader execution, by synchronous loads and by background refreshes.
/// Evictions are removals caused by the size bound or by expiry; explicit
/// invalidations are not evictions.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
  pub hit_count: u64,
  pub miss_count: u64,
  pub load_success_count: u64,
  pub load_exception_count: u64,
  /// Total nanoseconds spent in loaders.
  pub total_load_time: u64,
  pub eviction_count: u64,
}

impl CacheStats {
  pub fn request_count(&self) -> u64 {
    self.hit_count.saturating_add(self.miss_count)
  }

  /// `1.0` when there have been no requests.
  pub fn hit_rate(&self) -> f64 {
    match self.request_count() {
      0 => 1.0,
      requests => self.hit_count as f64 / requests as f64,
    }
  }

  pub fn miss_rate(&self) -> f64 {
    match self.request_count() {
      0 => 0.0,
      requests => self.miss_count as f64 / requests as f64,
    }
  }

  pub fn load_count(&self) -> u64 {
    self
      .load_success_count
      .saturating_add(self.load_exception_count)
  }

  pub fn load_exception_rate(&self) -> f64 {
    match self.load_count() {
      0 => 0.0,
      loads => self.load_exception_count as f64 / loads as f64,
    }
  }

  /// Mean nanoseconds per load.
  pub fn average_load_penalty(&self) -> f64 {
    match self.load_count() {
      0 => 0.0,
      loads => self.total_load_time as f64 / loads as f64,
    }
  }
}

impl fmt::Debug for CacheStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStats")
      .field("hit_count", &self.hit_count)
      .field("miss_count", &self.miss_count)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate() * 100.0))
      .field("load_success_count", &self.load_success_count)
      .field("load_exception_count", &self.load_exception_count)
      .field("total_load_time", &self.total_load_time)
      .field("eviction_count", &self.eviction_count)
      .finish()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn rates_without_requests() {
    let stats = CacheStats::default();
    assert_eq!(stats.request_count(), 0);
    assert_eq!(stats.hit_rate(), 1.0);
    assert_eq!(stats.miss_rate(), 0.0);
    assert_eq!(stats.load_exception_rate(), 0.0);
    assert_eq!(stats.average_load_penalty(), 0.0);
  }

  #[test]
  fn derived_values() {
    let metrics = Metrics::new();
    metrics.record_hit();
    metrics.record_hit();
    metrics.record_hit();
    metrics.record_miss();
    metrics.record_load_success(Duration::from_nanos(300));
    metrics.record_load_exception(Duration::from_nanos(100));
    metrics.record_evictions(2);

    let stats = metrics.snapshot();
    assert_eq!(stats.request_count(), 4);
    assert_eq!(stats.hit_rate(), 0.75);
    assert_eq!(stats.miss_rate(), 0.25);
    assert_eq!(stats.load_count(), 2);
    assert_eq!(stats.load_exception_rate(), 0.5);
    assert_eq!(stats.total_load_time, 400);
    assert_eq!(stats.average_load_penalty(), 200.0);
    assert_eq!(stats.eviction_count, 2);
  }
}
