use crate::spec::CacheSpec;
use crate::time;

use generational_arena::Index;

/// A stored value together with the metadata eviction and refresh need.
///
/// Entries live inside a segment and are only touched while its lock is held,
/// so the timestamps are plain integers.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  pub(crate) value: V,
  /// Identifies this particular write. A refresh only lands on the entry that
  /// scheduled it.
  pub(crate) generation: u64,
  /// Nanoseconds since the cache epoch.
  pub(crate) written_at: u64,
  pub(crate) accessed_at: u64,
  /// A background refresh for this entry is in flight.
  pub(crate) refreshing: bool,
  /// Position in the segment's access order.
  pub(crate) node: Index,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: V, generation: u64, now: u64, node: Index) -> Self {
    Self {
      value,
      generation,
      written_at: now,
      accessed_at: now,
      refreshing: false,
      node,
    }
  }

  /// Checks expire-after-write and expire-after-access.
  #[inline]
  pub(crate) fn is_expired(&self, spec: &CacheSpec, now: u64) -> bool {
    if let Some(ttl) = spec.expire_after_write {
      if time::has_elapsed(now, self.written_at, ttl) {
        return true;
      }
    }
    if let Some(tti) = spec.expire_after_access {
      if time::has_elapsed(now, self.accessed_at, tti) {
        return true;
      }
    }
    false
  }

  /// Checks whether a read at `now` should schedule a background refresh.
  #[inline]
  pub(crate) fn needs_refresh(&self, spec: &CacheSpec, now: u64) -> bool {
    match spec.refresh_after_write {
      Some(interval) => !self.refreshing && time::has_elapsed(now, self.written_at, interval),
      None => false,
    }
  }
}
