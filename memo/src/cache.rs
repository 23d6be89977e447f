use crate::executor::{Executor, Task};
use crate::loader::{AbandonOnUnwind, LoadFuture, Outcome};
use crate::metrics::{CacheStats, Metrics};
use crate::segment::Segment;
use crate::spec::CacheSpec;
use crate::stats::StatsSource;
use crate::time;

use core::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// The state shared by every handle to one cache.
pub(crate) struct CacheShared<K, V> {
  pub(crate) name: String,
  pub(crate) spec: CacheSpec,
  pub(crate) segments: Box<[CachePadded<Mutex<Segment<K, V>>>]>,
  pub(crate) hasher: ahash::RandomState,
  pub(crate) metrics: Metrics,
  pub(crate) executor: Arc<dyn Executor>,
  pub(crate) generations: AtomicU64,
}

enum Step<V> {
  Hit(V, Option<u64>),
  Wait(Arc<LoadFuture<V>>),
  Lead(Arc<LoadFuture<V>>),
}

impl<K, V> CacheShared<K, V>
where
  K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  #[inline]
  fn segment_index(&self, key: &K) -> usize {
    let mut state = self.hasher.build_hasher();
    key.hash(&mut state);
    state.finish() as usize & (self.segments.len() - 1)
  }

  #[inline]
  fn next_generation(&self) -> u64 {
    self.generations.fetch_add(1, Ordering::Relaxed)
  }

  /// Runs `loader` as the leader for `key` and publishes its outcome.
  fn load<E, F>(&self, index: usize, key: K, future: &Arc<LoadFuture<V>>, loader: F) -> Result<V, E>
  where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    F: FnOnce() -> Result<V, E>,
  {
    let guard = AbandonOnUnwind::new(&**future, || {
      self.segments[index].lock().finish_load(&key, future);
      tracing::warn!(cache = %self.name, key = ?key, "loader panicked; waiting callers will retry");
    });
    let started = Instant::now();
    let result = loader();
    let elapsed = started.elapsed();
    guard.disarm();

    match result {
      Ok(value) => {
        self.metrics.record_load_success(elapsed);
        let stored = {
          let mut segment = self.segments[index].lock();
          let current = segment.finish_load(&key, future);
          if current {
            let generation = self.next_generation();
            segment.insert(
              key.clone(),
              value.clone(),
              generation,
              time::now_nanos(),
              &self.metrics,
            );
          }
          current
        };
        tracing::trace!(cache = %self.name, key = ?key, stored, "loaded value");
        future.complete(Outcome::Loaded(value.clone()));
        Ok(value)
      }
      Err(err) => {
        self.metrics.record_load_exception(elapsed);
        self.segments[index].lock().finish_load(&key, future);
        tracing::warn!(cache = %self.name, key = ?key, error = ?err, "could not load value");
        future.complete(Outcome::Failed(Arc::new(err.clone())));
        Err(err)
      }
    }
  }

  /// Hands a reload of `key` to the executor. The entry keeps serving its
  /// current value until the reload lands.
  fn schedule_refresh<E, F>(shared: &Arc<Self>, key: K, generation: u64, loader: F)
  where
    E: fmt::Debug + 'static,
    F: FnOnce() -> Result<V, E> + Send + 'static,
  {
    let task_shared = Arc::clone(shared);
    let task_key = key.clone();
    let task: Task = Box::new(move || task_shared.refresh(task_key, generation, loader));

    if let Err(err) = shared.executor.execute(task) {
      tracing::debug!(cache = %shared.name, key = ?key, error = %err, "background refresh rejected");
      let index = shared.segment_index(&key);
      shared.segments[index].lock().abort_refresh(&key, generation);
    }
  }

  fn refresh<E, F>(&self, key: K, generation: u64, loader: F)
  where
    E: fmt::Debug,
    F: FnOnce() -> Result<V, E>,
  {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(loader));
    let elapsed = started.elapsed();
    let index = self.segment_index(&key);

    match result {
      Ok(Ok(value)) => {
        self.metrics.record_load_success(elapsed);
        let new_generation = self.next_generation();
        let replaced = self.segments[index].lock().complete_refresh(
          &key,
          generation,
          value,
          new_generation,
          time::now_nanos(),
        );
        tracing::trace!(cache = %self.name, key = ?key, replaced, "refreshed value");
      }
      Ok(Err(err)) => {
        self.metrics.record_load_exception(elapsed);
        self.segments[index].lock().abort_refresh(&key, generation);
        tracing::warn!(
          cache = %self.name,
          key = ?key,
          error = ?err,
          "could not refresh value; keeping the previous one"
        );
      }
      Err(_) => {
        self.metrics.record_load_exception(elapsed);
        self.segments[index].lock().abort_refresh(&key, generation);
        tracing::warn!(
          cache = %self.name,
          key = ?key,
          "loader panicked during refresh; keeping the previous value"
        );
      }
    }
  }
}

impl<K, V> StatsSource for CacheShared<K, V>
where
  K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  fn stats(&self) -> CacheStats {
    self.metrics.snapshot()
  }

  fn size(&self) -> u64 {
    self
      .segments
      .iter()
      .map(|segment| segment.lock().len() as u64)
      .sum()
  }

  fn clean_up(&self) {
    let now = time::now_nanos();
    for segment in self.segments.iter() {
      segment.lock().sweep_expired(&self.spec, now, &self.metrics);
    }
  }

  fn invalidate_all(&self) {
    let removed: usize = self
      .segments
      .iter()
      .map(|segment| segment.lock().invalidate_all())
      .sum();
    tracing::debug!(cache = %self.name, removed, "invalidated all entries");
  }
}

/// A concurrent, segmented cache that computes missing values with a
/// caller-supplied loader.
///
/// Concurrent misses for one key run the loader once; the other callers wait
/// for its outcome. With `refreshAfterWrite`, a read of an aging entry returns
/// the current value and reloads it in the background.
pub struct LoadingCache<K, V> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
}

impl<K, V> Clone for LoadingCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V> LoadingCache<K, V>
where
  K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn name(&self) -> &str {
    &self.shared.name
  }

  pub fn spec(&self) -> &CacheSpec {
    &self.shared.spec
  }

  /// Returns the cached value for `key`, computing it with `loader` on a miss.
  ///
  /// At most one loader runs per key at a time. A failing loader stores
  /// nothing and its error is returned to every caller that waited for it.
  /// If the entry is due for refresh, `loader` is instead handed to the
  /// executor and the current value is returned immediately.
  ///
  /// # Panics
  ///
  /// Panics if `loader` itself calls `get_or_load` for the same key on the
  /// same thread.
  pub fn get_or_load<E, F>(&self, key: K, loader: F) -> Result<V, E>
  where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    F: FnOnce() -> Result<V, E> + Send + 'static,
  {
    let shared = &self.shared;
    let index = shared.segment_index(&key);

    loop {
      let now = time::now_nanos();
      let step = {
        let mut segment = shared.segments[index].lock();
        segment.maintain(&shared.spec, now, &shared.metrics);
        if let Some((value, refresh)) = segment.get(&key, &shared.spec, now, true, &shared.metrics) {
          Step::Hit(value, refresh)
        } else if let Some(future) = segment.loading_for(&key) {
          Step::Wait(future)
        } else {
          Step::Lead(segment.begin_load(key.clone()))
        }
      };

      match step {
        Step::Hit(value, refresh) => {
          shared.metrics.record_hit();
          tracing::trace!(cache = %shared.name, key = ?key, "hit");
          if let Some(generation) = refresh {
            CacheShared::schedule_refresh(shared, key, generation, loader);
          }
          return Ok(value);
        }
        Step::Lead(future) => {
          shared.metrics.record_miss();
          return shared.load(index, key, &future, loader);
        }
        Step::Wait(future) => {
          if future.is_led_by_current_thread() {
            panic!("recursive load of {key:?} in cache '{}'", shared.name);
          }
          shared.metrics.record_miss();
          match future.wait() {
            Outcome::Loaded(value) => return Ok(value),
            Outcome::Failed(err) => match err.downcast_ref::<E>() {
              Some(err) => return Err(err.clone()),
              // The leader failed with another error type; load for ourselves.
              None => return loader(),
            },
            Outcome::Abandoned => continue,
          }
        }
      }
    }
  }

  /// Runs `loader` unconditionally and stores its value on success.
  ///
  /// A failure leaves any existing entry untouched.
  pub fn put<E, F>(&self, key: K, loader: F) -> Result<V, E>
  where
    E: fmt::Debug,
    F: FnOnce() -> Result<V, E>,
  {
    match loader() {
      Ok(value) => {
        self.insert(key, value.clone());
        Ok(value)
      }
      Err(err) => {
        tracing::warn!(cache = %self.shared.name, key = ?key, error = ?err, "could not compute value to put");
        Err(err)
      }
    }
  }

  /// Stores `value` for `key`, replacing any existing entry.
  pub fn insert(&self, key: K, value: V) {
    let shared = &self.shared;
    let index = shared.segment_index(&key);
    let now = time::now_nanos();
    let generation = shared.next_generation();
    {
      let mut segment = shared.segments[index].lock();
      segment.maintain(&shared.spec, now, &shared.metrics);
      segment.insert(key.clone(), value, generation, now, &shared.metrics);
    }
    tracing::debug!(cache = %shared.name, key = ?key, "stored value");
  }

  /// Returns the live value for `key` without loading or refreshing it.
  pub fn get_if_present(&self, key: &K) -> Option<V> {
    let shared = &self.shared;
    let index = shared.segment_index(key);
    let now = time::now_nanos();
    let found = {
      let mut segment = shared.segments[index].lock();
      segment.maintain(&shared.spec, now, &shared.metrics);
      segment.get(key, &shared.spec, now, false, &shared.metrics)
    };

    match found {
      Some((value, _)) => {
        shared.metrics.record_hit();
        Some(value)
      }
      None => {
        shared.metrics.record_miss();
        None
      }
    }
  }

  /// Removes the entry for `key`. A load in flight for `key` still returns
  /// its value to its callers but does not store it.
  pub fn invalidate(&self, key: &K) -> bool {
    let index = self.shared.segment_index(key);
    let removed = self.shared.segments[index].lock().invalidate(key);
    tracing::debug!(cache = %self.shared.name, key = ?key, removed, "invalidated entry");
    removed
  }

  pub fn invalidate_all(&self) {
    StatsSource::invalidate_all(&*self.shared);
  }

  /// Removes expired entries now instead of waiting for amortised maintenance.
  pub fn clean_up(&self) {
    StatsSource::clean_up(&*self.shared);
  }

  /// Number of stored entries. May include entries that have expired but
  /// have not been swept yet.
  pub fn size(&self) -> u64 {
    StatsSource::size(&*self.shared)
  }

  pub fn stats(&self) -> CacheStats {
    self.shared.metrics.snapshot()
  }

  pub(crate) fn stats_source(&self) -> Weak<dyn StatsSource> {
    let weak: Weak<CacheShared<K, V>> = Arc::downgrade(&self.shared);
    weak
  }
}

impl<K, V> fmt::Debug for LoadingCache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadingCache")
      .field("name", &self.shared.name)
      .field("spec", &self.shared.spec)
      .field("segments", &self.shared.segments.len())
      .finish()
  }
}
