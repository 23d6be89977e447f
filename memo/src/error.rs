use thiserror::Error;

/// A specification string could not be turned into a [`CacheSpec`](crate::CacheSpec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
  #[error("blank key-value pair in spec '{spec}'")]
  BlankPair { spec: String },

  #[error("key-value pair '{pair}' has more than one equals sign")]
  TooManyEquals { pair: String },

  #[error("unknown spec option '{key}'")]
  UnknownOption { key: String },

  #[error("spec option '{key}' is not supported by this cache")]
  Unsupported { key: String },

  #[error("spec option '{key}' was already set")]
  Duplicate { key: String },

  #[error("value of spec option '{key}' omitted")]
  MissingValue { key: String },

  #[error("spec option '{key}' does not take a value")]
  UnexpectedValue { key: String },

  #[error("invalid value '{value}' for spec option '{key}': {reason}")]
  InvalidValue {
    key: String,
    value: String,
    reason: String,
  },
}

/// The statistics endpoint for a cache could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
  #[error("'{name}' is not a valid statistics name: {reason}")]
  MalformedName { name: String, reason: &'static str },
}

/// Building a named cache failed. The name is left without a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  #[error("invalid spec for cache '{cache}': {source}")]
  Spec {
    cache: String,
    #[source]
    source: SpecError,
  },

  #[error("could not register statistics for cache '{cache}': {source}")]
  Registration {
    cache: String,
    #[source]
    source: RegistrationError,
  },
}

/// An executor did not accept a task. The task was dropped without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecuteError {
  #[error("executor has been shut down")]
  Shutdown,

  #[error("could not start a worker thread")]
  SpawnFailed,
}
