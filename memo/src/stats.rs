//! Read-only statistics endpoints, one per named cache.
//!
//! A [`StatsRegistry`] maps an [`ObjectName`] of the form
//! `fibre_memo:type=Cache,name=<cache>` to a [`CacheStatsBean`]. Beans only hold
//! a weak reference to their cache and report zeros once it is gone.

use crate::error::RegistrationError;
use crate::metrics::CacheStats;

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

/// What a cache exposes to its statistics endpoint.
pub trait StatsSource: Send + Sync {
  fn stats(&self) -> CacheStats;
  fn size(&self) -> u64;
  fn clean_up(&self);
  fn invalidate_all(&self);
}

const RESERVED: &[char] = &[',', '=', ':', '"', '*', '?', '\n'];

/// Identity of a statistics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName {
  canonical: String,
  cache_name: String,
}

impl ObjectName {
  pub const DOMAIN: &'static str = env!("CARGO_PKG_NAME");

  /// Builds the name for `cache_name`, rejecting characters that would make
  /// the name ambiguous.
  pub fn for_cache(cache_name: &str) -> Result<Self, RegistrationError> {
    if cache_name.is_empty() {
      return Err(RegistrationError::MalformedName {
        name: cache_name.to_string(),
        reason: "cache name is empty",
      });
    }
    if cache_name.contains(RESERVED) {
      return Err(RegistrationError::MalformedName {
        name: cache_name.to_string(),
        reason: "cache name contains a reserved character",
      });
    }
    Ok(Self {
      canonical: format!("{}:type=Cache,name={}", Self::DOMAIN, cache_name),
      cache_name: cache_name.to_string(),
    })
  }

  pub fn as_str(&self) -> &str {
    &self.canonical
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }
}

impl fmt::Display for ObjectName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.canonical)
  }
}

/// Everything a bean reports, read at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
  pub request_count: u64,
  pub hit_count: u64,
  pub hit_rate: f64,
  pub miss_count: u64,
  pub miss_rate: f64,
  pub load_count: u64,
  pub load_success_count: u64,
  pub load_exception_count: u64,
  pub load_exception_rate: f64,
  /// Nanoseconds.
  pub total_load_time: u64,
  /// Nanoseconds per load.
  pub average_load_penalty: f64,
  pub eviction_count: u64,
  pub size: u64,
}

impl StatsSnapshot {
  fn new(stats: CacheStats, size: u64) -> Self {
    Self {
      request_count: stats.request_count(),
      hit_count: stats.hit_count,
      hit_rate: stats.hit_rate(),
      miss_count: stats.miss_count,
      miss_rate: stats.miss_rate(),
      load_count: stats.load_count(),
      load_success_count: stats.load_success_count,
      load_exception_count: stats.load_exception_count,
      load_exception_rate: stats.load_exception_rate(),
      total_load_time: stats.total_load_time,
      average_load_penalty: stats.average_load_penalty(),
      eviction_count: stats.eviction_count,
      size,
    }
  }
}

/// The read-only statistics endpoint of one cache.
pub struct CacheStatsBean {
  name: ObjectName,
  source: Weak<dyn StatsSource>,
}

impl CacheStatsBean {
  pub fn object_name(&self) -> &ObjectName {
    &self.name
  }

  /// `false` once the cache behind this bean has been dropped.
  pub fn is_live(&self) -> bool {
    self.source.strong_count() > 0
  }

  fn stats(&self) -> CacheStats {
    self
      .source
      .upgrade()
      .map(|source| source.stats())
      .unwrap_or_default()
  }

  pub fn request_count(&self) -> u64 {
    self.stats().request_count()
  }

  pub fn hit_count(&self) -> u64 {
    self.stats().hit_count
  }

  pub fn hit_rate(&self) -> f64 {
    self.stats().hit_rate()
  }

  pub fn miss_count(&self) -> u64 {
    self.stats().miss_count
  }

  pub fn miss_rate(&self) -> f64 {
    self.stats().miss_rate()
  }

  pub fn load_count(&self) -> u64 {
    self.stats().load_count()
  }

  pub fn load_success_count(&self) -> u64 {
    self.stats().load_success_count
  }

  pub fn load_exception_count(&self) -> u64 {
    self.stats().load_exception_count
  }

  pub fn load_exception_rate(&self) -> f64 {
    self.stats().load_exception_rate()
  }

  pub fn total_load_time(&self) -> u64 {
    self.stats().total_load_time
  }

  pub fn average_load_penalty(&self) -> f64 {
    self.stats().average_load_penalty()
  }

  pub fn eviction_count(&self) -> u64 {
    self.stats().eviction_count
  }

  pub fn size(&self) -> u64 {
    self.source.upgrade().map_or(0, |source| source.size())
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    match self.source.upgrade() {
      Some(source) => StatsSnapshot::new(source.stats(), source.size()),
      None => StatsSnapshot::new(CacheStats::default(), 0),
    }
  }

  /// Sweeps expired entries.
  pub fn clean_up(&self) {
    if let Some(source) = self.source.upgrade() {
      source.clean_up();
    }
  }

  pub fn invalidate_all(&self) {
    if let Some(source) = self.source.upgrade() {
      source.invalidate_all();
    }
  }
}

impl fmt::Debug for CacheStatsBean {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStatsBean")
      .field("name", &self.name.as_str())
      .field("live", &self.is_live())
      .finish()
  }
}

static GLOBAL: Lazy<Arc<StatsRegistry>> = Lazy::new(|| Arc::new(StatsRegistry::new()));

/// A registry of statistics endpoints keyed by [`ObjectName`].
#[derive(Default)]
pub struct StatsRegistry {
  beans: DashMap<ObjectName, Arc<CacheStatsBean>>,
}

impl StatsRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The process-wide registry.
  pub fn global() -> Arc<StatsRegistry> {
    Arc::clone(&GLOBAL)
  }

  /// Exposes `source` under the name derived from `cache_name`.
  ///
  /// If the name is already registered the existing endpoint is kept, unless
  /// the cache behind it has been dropped.
  pub fn register_readonly(
    &self,
    cache_name: &str,
    source: Weak<dyn StatsSource>,
  ) -> Result<ObjectName, RegistrationError> {
    let name = ObjectName::for_cache(cache_name)?;
    match self.beans.entry(name.clone()) {
      Entry::Occupied(mut slot) if !slot.get().is_live() => {
        slot.insert(Arc::new(CacheStatsBean {
          name: name.clone(),
          source,
        }));
        tracing::debug!(name = %name, "replaced statistics of a dropped cache");
      }
      Entry::Occupied(_) => {
        tracing::debug!(name = %name, "statistics already registered; skipping");
      }
      Entry::Vacant(slot) => {
        slot.insert(Arc::new(CacheStatsBean {
          name: name.clone(),
          source,
        }));
        tracing::debug!(name = %name, "registered statistics");
      }
    }
    Ok(name)
  }

  pub fn is_registered(&self, name: &ObjectName) -> bool {
    self.beans.contains_key(name)
  }

  pub fn get(&self, name: &ObjectName) -> Option<Arc<CacheStatsBean>> {
    self.beans.get(name).map(|bean| Arc::clone(bean.value()))
  }

  /// Finds the endpoint for a cache by its plain name.
  pub fn lookup(&self, cache_name: &str) -> Option<Arc<CacheStatsBean>> {
    let name = ObjectName::for_cache(cache_name).ok()?;
    self.get(&name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<ObjectName> {
    let mut names: Vec<_> = self.beans.iter().map(|bean| bean.key().clone()).collect();
    names.sort();
    names
  }

  pub fn unregister(&self, name: &ObjectName) -> bool {
    self.beans.remove(name).is_some()
  }

  pub fn len(&self) -> usize {
    self.beans.len()
  }

  pub fn is_empty(&self) -> bool {
    self.beans.is_empty()
  }
}

impl fmt::Debug for StatsRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StatsRegistry")
      .field("registered", &self.beans.len())
      .finish()
  }
}
