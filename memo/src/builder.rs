use crate::cache::{CacheShared, LoadingCache};
use crate::error::SpecError;
use crate::executor::{self, Executor};
use crate::metrics::Metrics;
use crate::segment::Segment;
use crate::spec::{CacheSpec, DEFAULT_CONCURRENCY_LEVEL};

use core::fmt;
use std::hash::Hash;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

const MAX_SEGMENTS: u32 = 1 << 16;
// Upper bound on the pre-sizing hint handed to a single segment.
const MAX_SEGMENT_PRESIZE: u64 = 1 << 16;
// The segment count only doubles while `count * MIN_ENTRIES_PER_SEGMENT` fits
// in the size bound, so caches bounded below this are a single exact LRU.
const MIN_ENTRIES_PER_SEGMENT: u64 = 20;

/// A builder for [`LoadingCache`] instances.
pub struct CacheBuilder {
  name: String,
  spec: CacheSpec,
  executor: Option<Arc<dyn Executor>>,
}

impl fmt::Debug for CacheBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("spec", &self.spec)
      .field("has_executor", &self.executor.is_some())
      .finish()
  }
}

impl Default for CacheBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheBuilder {
  /// An unbounded cache with no expiry or refresh.
  pub fn new() -> Self {
    Self::from_spec(CacheSpec::default())
  }

  pub fn from_spec(spec: CacheSpec) -> Self {
    Self {
      name: String::from("anonymous"),
      spec,
      executor: None,
    }
  }

  /// Starts from a spec string such as `maximumSize=100,expireAfterWrite=10m`.
  pub fn parse(spec: &str) -> Result<Self, SpecError> {
    CacheSpec::parse(spec).map(Self::from_spec)
  }

  /// Sets the name used in logs and statistics.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn initial_capacity(mut self, capacity: u64) -> Self {
    self.spec.initial_capacity = Some(capacity);
    self
  }

  /// Bounds the number of entries. `0` stores nothing.
  pub fn maximum_size(mut self, size: u64) -> Self {
    self.spec.maximum_size = Some(size);
    self
  }

  pub fn concurrency_level(mut self, level: u32) -> Self {
    self.spec.concurrency_level = Some(level.max(1));
    self
  }

  pub fn expire_after_write(mut self, duration: Duration) -> Self {
    self.spec.expire_after_write = Some(duration);
    self
  }

  pub fn expire_after_access(mut self, duration: Duration) -> Self {
    self.spec.expire_after_access = Some(duration);
    self
  }

  /// Reads of entries older than `duration` reload them in the background.
  pub fn refresh_after_write(mut self, duration: Duration) -> Self {
    self.spec.refresh_after_write = Some(duration);
    self
  }

  /// Sets the executor that runs background refreshes.
  ///
  /// Defaults to a process-wide [`CachedThreadPool`](crate::CachedThreadPool).
  pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
    self.executor = Some(executor);
    self
  }

  pub fn build<K, V>(self) -> LoadingCache<K, V>
  where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
  {
    let capacities = segment_capacities(&self.spec);
    let presize = self
      .spec
      .initial_capacity
      .map(|initial| {
        let bounded = self.spec.maximum_size.map_or(initial, |max| initial.min(max));
        (bounded / capacities.len() as u64).min(MAX_SEGMENT_PRESIZE) as usize
      })
      .unwrap_or(0);

    let segments = capacities
      .iter()
      .map(|&capacity| CachePadded::new(Mutex::new(Segment::new(capacity, presize))))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    tracing::trace!(cache = %self.name, segments = segments.len(), "built cache");

    LoadingCache {
      shared: Arc::new(CacheShared {
        name: self.name,
        spec: self.spec,
        segments,
        hasher: ahash::RandomState::new(),
        metrics: Metrics::new(),
        executor: self.executor.unwrap_or_else(executor::shared_pool),
        generations: AtomicU64::new(0),
      }),
    }
  }
}

/// Per-segment entry bounds. The segment count is a power of two.
fn segment_capacities(spec: &CacheSpec) -> Vec<u64> {
  let level = spec
    .concurrency_level
    .unwrap_or(DEFAULT_CONCURRENCY_LEVEL)
    .clamp(1, MAX_SEGMENTS) as u64;

  let mut count: u64 = 1;
  while count < level
    && spec
      .maximum_size
      .map_or(true, |max| count * MIN_ENTRIES_PER_SEGMENT <= max)
  {
    count <<= 1;
  }

  match spec.maximum_size {
    None => vec![u64::MAX; count as usize],
    Some(max) => {
      let base = max / count;
      let remainder = max % count;
      (0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
    }
  }
}
