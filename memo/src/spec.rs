//! Structural cache parameters and the spec-string format they are read from.
//!
//! A spec string is a comma separated list of `key=value` options, for example
//! `maximumSize=100,refreshAfterWrite=1s`. Whitespace around keys and values is
//! ignored and an empty string means "no bounds at all".

use crate::error::SpecError;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The spec used for names that have no configuration: nothing is retained.
pub const DEFAULT_SPEC: &str = "maximumSize=0";

/// Number of segments a cache is split into when `concurrencyLevel` is not set.
pub(crate) const DEFAULT_CONCURRENCY_LEVEL: u32 = 4;

/// Resolved structural parameters for one named cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSpec {
  pub initial_capacity: Option<u64>,
  /// Upper bound on the number of entries. `Some(0)` disables storage.
  pub maximum_size: Option<u64>,
  pub concurrency_level: Option<u32>,
  pub expire_after_write: Option<Duration>,
  pub expire_after_access: Option<Duration>,
  /// Age after which the next read schedules a background refresh.
  pub refresh_after_write: Option<Duration>,
  /// Accepted for compatibility. Statistics are always recorded.
  pub record_stats: bool,
}

impl CacheSpec {
  /// Parses a spec string.
  pub fn parse(spec: &str) -> Result<Self, SpecError> {
    let mut parsed = CacheSpec::default();
    if spec.trim().is_empty() {
      return Ok(parsed);
    }

    for pair in spec.split(',') {
      let mut parts = pair.split('=').map(str::trim);
      let key = parts.next().unwrap_or_default();
      let value = parts.next();
      if parts.next().is_some() {
        return Err(SpecError::TooManyEquals {
          pair: pair.trim().to_string(),
        });
      }
      if key.is_empty() {
        return Err(SpecError::BlankPair {
          spec: spec.to_string(),
        });
      }
      parsed.apply(key, value)?;
    }

    Ok(parsed)
  }

  /// The spec for names without configuration.
  pub fn disabled() -> Self {
    CacheSpec {
      maximum_size: Some(0),
      ..CacheSpec::default()
    }
  }

  /// Returns `true` if no entry can ever be retained.
  pub fn is_disabled(&self) -> bool {
    self.maximum_size == Some(0)
  }

  fn apply(&mut self, key: &str, value: Option<&str>) -> Result<(), SpecError> {
    match key {
      "initialCapacity" => {
        let parsed = parse_integer(key, value)?;
        set_once(&mut self.initial_capacity, key, parsed)
      }
      "maximumSize" => {
        let parsed = parse_integer(key, value)?;
        set_once(&mut self.maximum_size, key, parsed)
      }
      "concurrencyLevel" => {
        let parsed = parse_integer(key, value)?;
        let level = u32::try_from(parsed)
          .ok()
          .filter(|level| *level > 0)
          .ok_or_else(|| invalid(key, value, "must be between 1 and 2^32-1"))?;
        set_once(&mut self.concurrency_level, key, level)
      }
      "expireAfterWrite" => {
        let parsed = parse_duration(key, value)?;
        set_once(&mut self.expire_after_write, key, parsed)
      }
      "expireAfterAccess" => {
        let parsed = parse_duration(key, value)?;
        set_once(&mut self.expire_after_access, key, parsed)
      }
      "refreshAfterWrite" | "refreshInterval" => {
        let parsed = parse_duration(key, value)?;
        set_once(&mut self.refresh_after_write, key, parsed)
      }
      "recordStats" => {
        if value.is_some() {
          return Err(SpecError::UnexpectedValue {
            key: key.to_string(),
          });
        }
        if self.record_stats {
          return Err(SpecError::Duplicate {
            key: key.to_string(),
          });
        }
        self.record_stats = true;
        Ok(())
      }
      "weakKeys" | "weakValues" | "softValues" | "maximumWeight" => Err(SpecError::Unsupported {
        key: key.to_string(),
      }),
      _ => Err(SpecError::UnknownOption {
        key: key.to_string(),
      }),
    }
  }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<(), SpecError> {
  if slot.is_some() {
    return Err(SpecError::Duplicate {
      key: key.to_string(),
    });
  }
  *slot = Some(value);
  Ok(())
}

fn required<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, SpecError> {
  match value {
    Some(value) if !value.is_empty() => Ok(value),
    _ => Err(SpecError::MissingValue {
      key: key.to_string(),
    }),
  }
}

fn invalid(key: &str, value: Option<&str>, reason: impl Into<String>) -> SpecError {
  SpecError::InvalidValue {
    key: key.to_string(),
    value: value.unwrap_or_default().to_string(),
    reason: reason.into(),
  }
}

fn parse_integer(key: &str, value: Option<&str>) -> Result<u64, SpecError> {
  let raw = required(key, value)?;
  raw
    .parse::<u64>()
    .map_err(|err| invalid(key, value, err.to_string()))
}

fn parse_duration(key: &str, value: Option<&str>) -> Result<Duration, SpecError> {
  let raw = required(key, value)?;
  humantime::parse_duration(raw).map_err(|err| invalid(key, value, err.to_string()))
}

impl FromStr for CacheSpec {
  type Err = SpecError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    CacheSpec::parse(s)
  }
}

/// Writes the spec back in parsable form, options in a fixed order.
impl fmt::Display for CacheSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut options: Vec<String> = Vec::new();
    if let Some(capacity) = self.initial_capacity {
      options.push(format!("initialCapacity={capacity}"));
    }
    if let Some(size) = self.maximum_size {
      options.push(format!("maximumSize={size}"));
    }
    if let Some(level) = self.concurrency_level {
      options.push(format!("concurrencyLevel={level}"));
    }
    if let Some(ttl) = self.expire_after_write {
      options.push(format!("expireAfterWrite={}", humantime::format_duration(ttl)));
    }
    if let Some(tti) = self.expire_after_access {
      options.push(format!("expireAfterAccess={}", humantime::format_duration(tti)));
    }
    if let Some(refresh) = self.refresh_after_write {
      options.push(format!("refreshAfterWrite={}", humantime::format_duration(refresh)));
    }
    if self.record_stats {
      options.push("recordStats".to_string());
    }
    f.write_str(&options.join(","))
  }
}
