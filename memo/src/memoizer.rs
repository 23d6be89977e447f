use crate::config::CacheProperties;
use crate::executor::{CachedThreadPool, Executor};
use crate::key::CallArgs;
use crate::registry::{CacheRegistry, Erased, NamedCache};
use crate::stats::StatsRegistry;

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// The memoization entry points.
///
/// Every operation names the cache it works on. Caches are created from the
/// configured [`CacheProperties`] the first time a name is used; names without
/// configuration retain nothing, so their operations always run.
///
/// ```
/// use fibre_memo::{args, CacheProperties, Memoizer};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let memo = Memoizer::new(CacheProperties::new().with("squares", "maximumSize=100"));
/// let calls = Arc::new(AtomicU32::new(0));
///
/// for _ in 0..3 {
///   let calls = Arc::clone(&calls);
///   let square = memo.result("squares", &args![12_u64], move || {
///     calls.fetch_add(1, Ordering::SeqCst);
///     Ok::<_, String>(12_u64 * 12)
///   });
///   assert_eq!(square, Ok(144));
/// }
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Memoizer {
  registry: Arc<CacheRegistry>,
}

impl Memoizer {
  /// A memoizer with its own refresh pool, reporting to the global
  /// [`StatsRegistry`].
  pub fn new(properties: CacheProperties) -> Self {
    Self::builder().properties(properties).build()
  }

  pub fn builder() -> MemoizerBuilder {
    MemoizerBuilder::default()
  }

  pub fn registry(&self) -> &CacheRegistry {
    &self.registry
  }

  /// The cache backing `name`, created if needed.
  pub fn cache(&self, name: &str) -> Option<NamedCache> {
    self.registry.get_or_create(name)
  }

  /// Returns the cached result of `op` for `args`, running it on a miss.
  ///
  /// `op` may also be run later on a background thread to refresh the entry.
  /// Its error is returned as is and nothing is cached for it.
  pub fn result<T, E, F>(&self, name: &str, args: &CallArgs, op: F) -> Result<T, E>
  where
    T: Clone + Send + Sync + 'static,
    E: Clone + fmt::Debug + Send + Sync + 'static,
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
  {
    let cache = match self.registry.get_or_create(name) {
      Some(cache) => cache,
      None => return op(),
    };

    let op = Arc::new(op);
    let loader = {
      let op = Arc::clone(&op);
      move || op().map(|value| Arc::new(value) as Erased)
    };

    let stored = cache.get_or_load(args.key(), loader)?;
    match stored.downcast_ref::<T>() {
      Some(value) => Ok(value.clone()),
      None => {
        tracing::warn!(
          cache = name,
          expected = type_name::<T>(),
          "cached value has a different type; running the operation directly"
        );
        op()
      }
    }
  }

  /// Runs `op` and stores its value for `args`, replacing any cached one.
  /// A failure is returned as is and leaves the cached value untouched.
  pub fn put<T, E, F>(&self, name: &str, args: &CallArgs, op: F) -> Result<T, E>
  where
    T: Clone + Send + Sync + 'static,
    E: fmt::Debug,
    F: Fn() -> Result<T, E>,
  {
    let cache = match self.registry.get_or_create(name) {
      Some(cache) => cache,
      None => return op(),
    };

    let stored = cache.put(args.key(), || op().map(|value| Arc::new(value) as Erased))?;
    match stored.downcast_ref::<T>() {
      Some(value) => Ok(value.clone()),
      None => {
        tracing::warn!(
          cache = name,
          expected = type_name::<T>(),
          "stored value has a different type; running the operation directly"
        );
        op()
      }
    }
  }

  /// Drops the cached result for `args`.
  pub fn remove(&self, name: &str, args: &CallArgs) {
    self.registry.remove(name, &args.key());
  }

  /// Drops every cached result of `name`.
  pub fn remove_all(&self, name: &str) {
    self.registry.remove_all(name);
  }

  /// Stops background refreshes. See [`CacheRegistry::shutdown`].
  pub fn shutdown(&self) {
    self.registry.shutdown();
  }
}

impl fmt::Debug for Memoizer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Memoizer").field(&self.registry).finish()
  }
}

/// Configures a [`Memoizer`].
#[derive(Default)]
pub struct MemoizerBuilder {
  properties: CacheProperties,
  executor: Option<Arc<dyn Executor>>,
  stats: Option<Arc<StatsRegistry>>,
}

impl MemoizerBuilder {
  pub fn properties(mut self, properties: CacheProperties) -> Self {
    self.properties = properties;
    self
  }

  /// Adds or replaces the spec of one cache.
  pub fn cache(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
    self.properties.insert(name, spec);
    self
  }

  /// Sets the executor for background refreshes. Defaults to a new
  /// [`CachedThreadPool`] owned by the memoizer.
  pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
    self.executor = Some(executor);
    self
  }

  /// Sets where statistics are registered. Defaults to
  /// [`StatsRegistry::global`].
  pub fn stats_registry(mut self, stats: Arc<StatsRegistry>) -> Self {
    self.stats = Some(stats);
    self
  }

  pub fn build(self) -> Memoizer {
    let executor = self
      .executor
      .unwrap_or_else(|| Arc::new(CachedThreadPool::new("fibre-memo-refresh")) as Arc<dyn Executor>);
    let stats = self.stats.unwrap_or_else(StatsRegistry::global);
    Memoizer {
      registry: Arc::new(CacheRegistry::new(self.properties, executor, stats)),
    }
  }
}

impl fmt::Debug for MemoizerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoizerBuilder")
      .field("properties", &self.properties)
      .field("has_executor", &self.executor.is_some())
      .field("has_stats_registry", &self.stats.is_some())
      .finish()
  }
}
