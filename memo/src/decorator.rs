//! Wrapping an operation so that calls to it go through a named cache.
//!
//! ```
//! use fibre_memo::{args, operation_fn, CacheAction, CallArgs, Memoized, Memoizer, Operation};
//!
//! let memo = Memoizer::builder().cache("lengths", "maximumSize=10").build();
//! let length = operation_fn(|args: &CallArgs| {
//!   let text = args.get_as::<&str>(0).copied().unwrap_or_default();
//!   Ok::<_, String>(text.len())
//! });
//!
//! let cached = Memoized::new(memo.clone(), "lengths", CacheAction::Result, length);
//! assert_eq!(cached.call(&args!["hello"]), Ok(5));
//! assert_eq!(memo.cache("lengths").unwrap().size(), 1);
//! ```

use crate::key::CallArgs;
use crate::memoizer::Memoizer;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A callable whose results can be memoized.
pub trait Operation: Send + Sync + 'static {
  type Output: Clone + Send + Sync + 'static;
  type Error: Clone + fmt::Debug + Send + Sync + 'static;

  fn call(&self, args: &CallArgs) -> Result<Self::Output, Self::Error>;
}

/// An [`Operation`] backed by a closure. See [`operation_fn`].
pub struct OperationFn<F, T, E> {
  f: F,
  _marker: PhantomData<fn() -> Result<T, E>>,
}

/// Turns a closure over the call arguments into an [`Operation`].
pub fn operation_fn<F, T, E>(f: F) -> OperationFn<F, T, E>
where
  F: Fn(&CallArgs) -> Result<T, E> + Send + Sync + 'static,
{
  OperationFn {
    f,
    _marker: PhantomData,
  }
}

impl<F, T, E> Operation for OperationFn<F, T, E>
where
  F: Fn(&CallArgs) -> Result<T, E> + Send + Sync + 'static,
  T: Clone + Send + Sync + 'static,
  E: Clone + fmt::Debug + Send + Sync + 'static,
{
  type Output = T;
  type Error = E;

  fn call(&self, args: &CallArgs) -> Result<T, E> {
    (self.f)(args)
  }
}

/// What a [`Memoized`] operation does with its cache on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheAction {
  /// Return the cached result, calling the operation on a miss.
  Result,
  /// Always call the operation and cache its result.
  Put,
  /// Drop the cached result for these arguments, then call the operation.
  Remove,
  /// Drop every cached result of the cache, then call the operation.
  RemoveAll,
}

/// An operation decorated with a [`CacheAction`] on a named cache.
pub struct Memoized<O> {
  inner: Arc<O>,
  memoizer: Memoizer,
  cache_name: String,
  action: CacheAction,
}

impl<O: Operation> Memoized<O> {
  pub fn new(memoizer: Memoizer, cache_name: impl Into<String>, action: CacheAction, operation: O) -> Self {
    Self {
      inner: Arc::new(operation),
      memoizer,
      cache_name: cache_name.into(),
      action,
    }
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  pub fn action(&self) -> CacheAction {
    self.action
  }

  /// The undecorated operation.
  pub fn inner(&self) -> &O {
    &self.inner
  }
}

impl<O: Operation> Operation for Memoized<O> {
  type Output = O::Output;
  type Error = O::Error;

  fn call(&self, args: &CallArgs) -> Result<O::Output, O::Error> {
    match self.action {
      CacheAction::Result => {
        let operation = Arc::clone(&self.inner);
        let owned = args.clone();
        self
          .memoizer
          .result(&self.cache_name, args, move || operation.call(&owned))
      }
      CacheAction::Put => self
        .memoizer
        .put(&self.cache_name, args, || self.inner.call(args)),
      CacheAction::Remove => {
        self.memoizer.remove(&self.cache_name, args);
        self.inner.call(args)
      }
      CacheAction::RemoveAll => {
        self.memoizer.remove_all(&self.cache_name);
        self.inner.call(args)
      }
    }
  }
}

impl<O> fmt::Debug for Memoized<O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Memoized")
      .field("cache_name", &self.cache_name)
      .field("action", &self.action)
      .finish_non_exhaustive()
  }
}
