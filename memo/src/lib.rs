//! Name-partitioned memoization of operation results.
//!
//! Callers identify an operation by a cache name and its call arguments. The
//! first call computes the result and stores it in the cache for that name;
//! later calls with equal arguments are served from the cache.
//!
//! # Features
//! - **Lazy, declarative caches**: each name gets its own cache, built on first
//!   use from a spec string such as `maximumSize=100,refreshAfterWrite=1m`.
//!   Unconfigured names retain nothing.
//! - **Collision-safe keys**: heterogeneous argument lists are compared by
//!   concrete type and value.
//! - **Single-flight loads**: concurrent misses for one key run the operation
//!   once.
//! - **Background refresh**: aging entries are served while they reload on an
//!   executor; a failed reload keeps the old value.
//! - **Statistics**: every cache exposes hit, miss, load and eviction counters
//!   through a [`StatsRegistry`].

// Public modules that form the API
pub mod builder;
pub mod cache;
pub mod config;
pub mod decorator;
pub mod error;
pub mod executor;
pub mod key;
pub mod memoizer;
pub mod registry;
pub mod spec;
pub mod stats;

mod global;
mod macros;

// Internal, crate-only modules
mod entry;
mod loader;
mod lru;
mod metrics;
mod segment;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use cache::LoadingCache;
pub use config::CacheProperties;
pub use decorator::{operation_fn, CacheAction, Memoized, Operation, OperationFn};
pub use error::{BuildError, ExecuteError, RegistrationError, SpecError};
pub use executor::{CachedThreadPool, Executor, Task};
pub use global::{global, init_global};
pub use key::{derive_key, Arg, CallArgs, CallKey, KeyPart};
pub use memoizer::{Memoizer, MemoizerBuilder};
pub use metrics::CacheStats;
pub use registry::{CacheRegistry, Erased, NamedCache};
pub use spec::{CacheSpec, DEFAULT_SPEC};
pub use stats::{CacheStatsBean, ObjectName, StatsRegistry, StatsSnapshot, StatsSource};

#[cfg(feature = "tokio")]
pub use executor::TokioSpawner;
