use crate::error::SpecError;
use crate::spec::{CacheSpec, DEFAULT_SPEC};

use std::collections::HashMap;

/// Per-name cache configuration: cache name to spec string.
///
/// With the `serde` feature enabled this deserializes from a flat map, so it
/// can be embedded in whatever configuration format the application uses.
///
/// ```
/// use fibre_memo::CacheProperties;
///
/// let properties = CacheProperties::new()
///   .with("prices", "maximumSize=100,refreshAfterWrite=1s")
///   .with("users", "maximumSize=1000,expireAfterAccess=10m");
///
/// assert_eq!(properties.resolve("prices").unwrap().maximum_size, Some(100));
/// // Unconfigured names resolve to a spec that retains nothing.
/// assert!(properties.resolve("unknown").unwrap().is_disabled());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CacheProperties {
  specs: HashMap<String, String>,
}

impl CacheProperties {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or replaces the spec for `name`.
  pub fn with(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
    self.insert(name, spec);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, spec: impl Into<String>) -> Option<String> {
    self.specs.insert(name.into(), spec.into())
  }

  /// The raw spec string configured for `name`, if any.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.specs.get(name).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.specs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.specs.is_empty()
  }

  /// Resolves the structural spec for `name`, falling back to [`DEFAULT_SPEC`].
  pub fn resolve(&self, name: &str) -> Result<CacheSpec, SpecError> {
    CacheSpec::parse(self.get(name).unwrap_or(DEFAULT_SPEC))
  }
}

impl From<HashMap<String, String>> for CacheProperties {
  fn from(specs: HashMap<String, String>) -> Self {
    Self { specs }
  }
}

impl<N: Into<String>, S: Into<String>> FromIterator<(N, S)> for CacheProperties {
  fn from_iter<I: IntoIterator<Item = (N, S)>>(iter: I) -> Self {
    let mut properties = CacheProperties::new();
    properties.extend(iter);
    properties
  }
}

impl<N: Into<String>, S: Into<String>> Extend<(N, S)> for CacheProperties {
  fn extend<I: IntoIterator<Item = (N, S)>>(&mut self, iter: I) {
    for (name, spec) in iter {
      self.insert(name, spec);
    }
  }
}
