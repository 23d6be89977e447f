use crate::entry::CacheEntry;
use crate::loader::LoadFuture;
use crate::lru::LruList;
use crate::metrics::Metrics;
use crate::spec::CacheSpec;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Number of operations on a segment between two expiry sweeps.
const MAINTENANCE_INTERVAL: u32 = 64;

/// One independently locked partition of a cache.
///
/// Entries, in-flight loads and the access order share the segment's lock, so
/// "is it cached, is it loading, or do I load it" is decided atomically.
pub(crate) struct Segment<K, V> {
  entries: HashMap<K, CacheEntry<V>, ahash::RandomState>,
  loading: HashMap<K, Arc<LoadFuture<V>>, ahash::RandomState>,
  order: LruList<K>,
  capacity: u64,
  ops_since_sweep: u32,
}

impl<K, V> Segment<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub(crate) fn new(capacity: u64, initial_capacity: usize) -> Self {
    Self {
      entries: HashMap::with_capacity_and_hasher(initial_capacity, ahash::RandomState::new()),
      loading: HashMap::with_hasher(ahash::RandomState::new()),
      order: LruList::new(),
      capacity,
      ops_since_sweep: 0,
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  /// Looks up a live value. Expired entries are removed and reported as absent.
  ///
  /// When `may_refresh` is set and the entry is due, it is marked as refreshing
  /// and its generation is returned so the caller can schedule the reload.
  pub(crate) fn get(
    &mut self,
    key: &K,
    spec: &CacheSpec,
    now: u64,
    may_refresh: bool,
    metrics: &Metrics,
  ) -> Option<(V, Option<u64>)> {
    let expired = self.entries.get(key)?.is_expired(spec, now);
    if expired {
      self.remove_entry(key);
      metrics.record_evictions(1);
      return None;
    }

    let entry = self.entries.get_mut(key)?;
    entry.accessed_at = now;
    self.order.touch(entry.node);

    let refresh = if may_refresh && entry.needs_refresh(spec, now) {
      entry.refreshing = true;
      Some(entry.generation)
    } else {
      None
    };
    Some((entry.value.clone(), refresh))
  }

  /// Stores `value`, replacing any previous entry, then enforces the size bound.
  pub(crate) fn insert(&mut self, key: K, value: V, generation: u64, now: u64, metrics: &Metrics) {
    self.remove_entry(&key);
    let node = self.order.push_front(key.clone());
    self
      .entries
      .insert(key, CacheEntry::new(value, generation, now, node));
    self.evict_to_capacity(metrics);
  }

  fn evict_to_capacity(&mut self, metrics: &Metrics) {
    let mut evicted = 0;
    while self.order.len() as u64 > self.capacity {
      match self.order.pop_back() {
        Some(key) => {
          self.entries.remove(&key);
          evicted += 1;
        }
        None => break,
      }
    }
    metrics.record_evictions(evicted);
  }

  fn remove_entry(&mut self, key: &K) -> bool {
    match self.entries.remove(key) {
      Some(entry) => {
        self.order.remove(entry.node);
        true
      }
      None => false,
    }
  }

  /// Lands a background refresh, unless the entry was replaced or removed
  /// since the refresh was scheduled.
  pub(crate) fn complete_refresh(
    &mut self,
    key: &K,
    generation: u64,
    value: V,
    new_generation: u64,
    now: u64,
  ) -> bool {
    match self.entries.get_mut(key) {
      Some(entry) if entry.generation == generation => {
        entry.value = value;
        entry.generation = new_generation;
        entry.written_at = now;
        entry.refreshing = false;
        true
      }
      _ => false,
    }
  }

  /// Clears the refreshing mark so a later read can try again.
  pub(crate) fn abort_refresh(&mut self, key: &K, generation: u64) {
    if let Some(entry) = self.entries.get_mut(key) {
      if entry.generation == generation {
        entry.refreshing = false;
      }
    }
  }

  /// Removes the entry and detaches any in-flight load for `key`, whose
  /// result will then reach its callers without being stored.
  pub(crate) fn invalidate(&mut self, key: &K) -> bool {
    self.loading.remove(key);
    self.remove_entry(key)
  }

  pub(crate) fn invalidate_all(&mut self) -> usize {
    let removed = self.entries.len();
    self.entries.clear();
    self.loading.clear();
    self.order.clear();
    removed
  }

  /// Removes every expired entry.
  pub(crate) fn sweep_expired(&mut self, spec: &CacheSpec, now: u64, metrics: &Metrics) {
    if spec.expire_after_write.is_none() && spec.expire_after_access.is_none() {
      return;
    }
    let expired: Vec<K> = self
      .entries
      .iter()
      .filter(|(_, entry)| entry.is_expired(spec, now))
      .map(|(key, _)| key.clone())
      .collect();

    for key in &expired {
      self.remove_entry(key);
    }
    metrics.record_evictions(expired.len() as u64);
  }

  /// Amortised maintenance, run on every operation that takes the lock.
  pub(crate) fn maintain(&mut self, spec: &CacheSpec, now: u64, metrics: &Metrics) {
    self.ops_since_sweep += 1;
    if self.ops_since_sweep >= MAINTENANCE_INTERVAL {
      self.ops_since_sweep = 0;
      self.sweep_expired(spec, now, metrics);
    }
  }

  pub(crate) fn loading_for(&self, key: &K) -> Option<Arc<LoadFuture<V>>> {
    self.loading.get(key).cloned()
  }

  /// Registers the caller as the leader for `key`.
  pub(crate) fn begin_load(&mut self, key: K) -> Arc<LoadFuture<V>> {
    let future = Arc::new(LoadFuture::new());
    self.loading.insert(key, Arc::clone(&future));
    future
  }

  /// Unregisters `future`. Returns `false` if it had already been detached by
  /// an invalidation, in which case its result must not be stored.
  pub(crate) fn finish_load(&mut self, key: &K, future: &Arc<LoadFuture<V>>) -> bool {
    match self.loading.get(key) {
      Some(current) if Arc::ptr_eq(current, future) => {
        self.loading.remove(key);
        true
      }
      _ => false,
    }
  }
}
