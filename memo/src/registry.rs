//! Name to cache mapping with lazy, exactly-once construction.

use crate::builder::CacheBuilder;
use crate::cache::LoadingCache;
use crate::config::CacheProperties;
use crate::error::BuildError;
use crate::executor::Executor;
use crate::key::CallKey;
use crate::stats::StatsRegistry;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// A stored value with its concrete type erased. Callers downcast it back.
pub type Erased = Arc<dyn Any + Send + Sync>;

/// The cache type every name is backed by.
pub type NamedCache = LoadingCache<CallKey, Erased>;

enum Provision {
  Ready(NamedCache),
  /// Construction failed. Calls for this name bypass caching.
  Unavailable,
}

impl Provision {
  fn cache(&self) -> Option<NamedCache> {
    match self {
      Provision::Ready(cache) => Some(cache.clone()),
      Provision::Unavailable => None,
    }
  }
}

/// Owns one [`LoadingCache`] per cache name.
pub struct CacheRegistry {
  properties: CacheProperties,
  caches: DashMap<String, Provision>,
  executor: Arc<dyn Executor>,
  stats: Arc<StatsRegistry>,
}

impl CacheRegistry {
  pub fn new(properties: CacheProperties, executor: Arc<dyn Executor>, stats: Arc<StatsRegistry>) -> Self {
    Self {
      properties,
      caches: DashMap::new(),
      executor,
      stats,
    }
  }

  pub fn properties(&self) -> &CacheProperties {
    &self.properties
  }

  pub fn stats_registry(&self) -> &Arc<StatsRegistry> {
    &self.stats
  }

  pub fn executor(&self) -> &Arc<dyn Executor> {
    &self.executor
  }

  /// Returns the cache for `name`, building it on first use.
  ///
  /// Concurrent first callers all receive the same instance. `None` means
  /// the cache could not be built; the failure is logged once and remembered.
  pub fn get_or_create(&self, name: &str) -> Option<NamedCache> {
    if let Some(provision) = self.caches.get(name) {
      return provision.cache();
    }
    self
      .caches
      .entry(name.to_string())
      .or_insert_with(|| self.provision(name))
      .cache()
  }

  /// Returns the cache for `name` if it has already been built.
  pub fn get(&self, name: &str) -> Option<NamedCache> {
    self.caches.get(name).and_then(|provision| provision.cache())
  }

  /// `true` if building the cache for `name` was attempted and failed.
  pub fn is_unavailable(&self, name: &str) -> bool {
    self
      .caches
      .get(name)
      .map_or(false, |provision| matches!(*provision, Provision::Unavailable))
  }

  fn provision(&self, name: &str) -> Provision {
    match self.build(name) {
      Ok(cache) => {
        tracing::info!(cache = name, spec = %cache.spec(), "created cache");
        Provision::Ready(cache)
      }
      Err(err) => {
        tracing::error!(cache = name, error = %err, "could not create cache; calls will not be cached");
        Provision::Unavailable
      }
    }
  }

  fn build(&self, name: &str) -> Result<NamedCache, BuildError> {
    let spec = self.properties.resolve(name).map_err(|source| BuildError::Spec {
      cache: name.to_string(),
      source,
    })?;

    let cache: NamedCache = CacheBuilder::from_spec(spec)
      .name(name)
      .executor(Arc::clone(&self.executor))
      .build();

    self
      .stats
      .register_readonly(name, cache.stats_source())
      .map_err(|source| BuildError::Registration {
        cache: name.to_string(),
        source,
      })?;

    Ok(cache)
  }

  /// Invalidates one entry. Unknown names are ignored.
  pub fn remove(&self, name: &str, key: &CallKey) {
    if let Some(cache) = self.get(name) {
      cache.invalidate(key);
    }
  }

  /// Invalidates every entry of one cache. Unknown names are ignored.
  pub fn remove_all(&self, name: &str) {
    if let Some(cache) = self.get(name) {
      cache.invalidate_all();
    }
  }

  /// Names of the caches built so far, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<_> = self
      .caches
      .iter()
      .filter(|provision| matches!(provision.value(), Provision::Ready(_)))
      .map(|provision| provision.key().clone())
      .collect();
    names.sort();
    names
  }

  /// Stops the background executor. Caches keep serving; due refreshes are
  /// skipped from now on.
  pub fn shutdown(&self) {
    tracing::info!(caches = self.caches.len(), "shutting down cache registry");
    self.executor.shutdown();
  }
}

impl fmt::Debug for CacheRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheRegistry")
      .field("configured", &self.properties.len())
      .field("caches", &self.caches.len())
      .finish_non_exhaustive()
  }
}
