//! Keys derived from call arguments.
//!
//! A call is identified by its ordered argument list. Arguments are
//! type-erased so that one cache name can memoize operations whose parameters
//! have different types, while equality and hashing still use each value's
//! own `Eq` and `Hash`.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value usable as a call argument.
///
/// Implemented for every `'static` type that is `Eq + Hash + Debug + Send + Sync`.
pub trait KeyPart: Any + Send + Sync + fmt::Debug {
  /// Compares with another erased part. Parts of different types are never equal.
  fn eq_part(&self, other: &dyn KeyPart) -> bool;

  /// Feeds the concrete type and the value into `state`.
  fn hash_part(&self, state: &mut dyn Hasher);

  fn as_any(&self) -> &dyn Any;
}

impl<T> KeyPart for T
where
  T: Any + Eq + Hash + Send + Sync + fmt::Debug,
{
  fn eq_part(&self, other: &dyn KeyPart) -> bool {
    other
      .as_any()
      .downcast_ref::<T>()
      .is_some_and(|other| self == other)
  }

  fn hash_part(&self, mut state: &mut dyn Hasher) {
    TypeId::of::<T>().hash(&mut state);
    self.hash(&mut state);
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// One non-null call argument.
#[derive(Clone)]
pub struct Arg(Arc<dyn KeyPart>);

impl Arg {
  /// Wraps a value. Wrapping an `Arg` returns it unchanged.
  pub fn new<T: KeyPart>(value: T) -> Self {
    if let Some(arg) = (&value as &dyn Any).downcast_ref::<Arg>() {
      return arg.clone();
    }
    Arg(Arc::new(value))
  }

  /// Maps a nullable value into an argument slot.
  pub fn from_option<T: KeyPart>(value: Option<T>) -> Option<Self> {
    value.map(Arg::new)
  }

  /// Returns the wrapped value if it is a `T`.
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    (*self.0).as_any().downcast_ref::<T>()
  }
}

impl PartialEq for Arg {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0) || (*self.0).eq_part(&*other.0)
  }
}

impl Eq for Arg {}

impl Hash for Arg {
  fn hash<H: Hasher>(&self, state: &mut H) {
    (*self.0).hash_part(state);
  }
}

impl fmt::Debug for Arg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

/// The ordered arguments of one call. Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CallArgs(Arc<[Option<Arg>]>);

impl CallArgs {
  /// An empty argument list.
  pub fn new() -> Self {
    CallArgs(Arc::from(Vec::new()))
  }

  /// Returns a copy of this list with `value` appended.
  pub fn with<T: KeyPart>(self, value: T) -> Self {
    self.push_slot(Some(Arg::new(value)))
  }

  /// Returns a copy of this list with a null argument appended.
  pub fn with_null(self) -> Self {
    self.push_slot(None)
  }

  fn push_slot(self, slot: Option<Arg>) -> Self {
    let mut slots = self.0.to_vec();
    slots.push(slot);
    CallArgs(slots.into())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// The argument at `index`; `None` for a null argument or an out-of-range index.
  pub fn get(&self, index: usize) -> Option<&Arg> {
    self.0.get(index).and_then(Option::as_ref)
  }

  /// Typed access to the argument at `index`.
  pub fn get_as<T: Any>(&self, index: usize) -> Option<&T> {
    self.get(index).and_then(Arg::downcast_ref)
  }

  pub fn as_slice(&self) -> &[Option<Arg>] {
    &self.0
  }

  /// Derives the cache key for these arguments.
  pub fn key(&self) -> CallKey {
    derive_key(&self.0)
  }
}

impl fmt::Debug for CallArgs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.0.iter()).finish()
  }
}

impl Default for CallArgs {
  fn default() -> Self {
    Self::new()
  }
}

impl From<Vec<Option<Arg>>> for CallArgs {
  fn from(slots: Vec<Option<Arg>>) -> Self {
    CallArgs(slots.into())
  }
}

impl FromIterator<Option<Arg>> for CallArgs {
  fn from_iter<I: IntoIterator<Item = Option<Arg>>>(iter: I) -> Self {
    CallArgs(iter.into_iter().collect())
  }
}

impl FromIterator<Arg> for CallArgs {
  fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
    iter.into_iter().map(Some).collect()
  }
}

/// The identity of one call within a named cache.
///
/// Keys never change after construction. Keys of different shapes are never
/// equal, so `Single(x)` and `Composite([x, y])` cannot collide.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CallKey {
  /// Shared by every zero-argument call.
  Empty,
  /// Exactly one non-null argument.
  Single(Arg),
  /// Any other argument list, compared element by element.
  Composite(Arc<[Option<Arg>]>),
}

impl CallKey {
  /// The arguments this key was derived from.
  pub fn parameters(&self) -> Vec<Option<Arg>> {
    match self {
      CallKey::Empty => Vec::new(),
      CallKey::Single(arg) => vec![Some(arg.clone())],
      CallKey::Composite(slots) => slots.to_vec(),
    }
  }
}

impl fmt::Debug for CallKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CallKey::Empty => f.write_str("CallKey::Empty"),
      CallKey::Single(arg) => f.debug_tuple("CallKey::Single").field(arg).finish(),
      CallKey::Composite(slots) => f.debug_tuple("CallKey::Composite").field(slots).finish(),
    }
  }
}

/// Derives the key for an argument list. Pure.
pub fn derive_key(arguments: &[Option<Arg>]) -> CallKey {
  match arguments {
    [] => CallKey::Empty,
    [Some(single)] => CallKey::Single(single.clone()),
    slots => CallKey::Composite(slots.into()),
  }
}
