use fibre_memo::{CacheProperties, CacheSpec, SpecError, DEFAULT_SPEC};
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_unconfigured_names_resolve_to_the_default() {
  let properties = CacheProperties::new().with("prices", "maximumSize=10");
  let spec = properties.resolve("unknown").unwrap();
  assert_eq!(spec, CacheSpec::parse(DEFAULT_SPEC).unwrap());
  assert!(spec.is_disabled());
}

#[test]
fn test_configured_names_resolve_their_spec() {
  let properties: CacheProperties = [
    ("prices", "maximumSize=10, expireAfterWrite=5m"),
    ("users", "refreshAfterWrite=1m 30s"),
  ]
  .into_iter()
  .collect();

  let prices = properties.resolve("prices").unwrap();
  assert_eq!(prices.maximum_size, Some(10));
  assert_eq!(prices.expire_after_write, Some(Duration::from_secs(300)));

  let users = properties.resolve("users").unwrap();
  assert_eq!(users.maximum_size, None);
  assert_eq!(users.refresh_after_write, Some(Duration::from_secs(90)));
}

#[test]
fn test_malformed_specs_are_rejected() {
  let cases: Vec<(&str, fn(&SpecError) -> bool)> = vec![
    ("maximumSize", |e| matches!(e, SpecError::MissingValue { .. })),
    ("maximumSize=", |e| matches!(e, SpecError::MissingValue { .. })),
    ("maximumSize=abc", |e| matches!(e, SpecError::InvalidValue { .. })),
    ("maximumSize=-1", |e| matches!(e, SpecError::InvalidValue { .. })),
    ("maximumSize=1=2", |e| matches!(e, SpecError::TooManyEquals { .. })),
    ("maximumSize=1,,", |e| matches!(e, SpecError::BlankPair { .. })),
    ("maximumSize=1,maximumSize=2", |e| matches!(e, SpecError::Duplicate { .. })),
    ("expireAfterWrite=10", |e| matches!(e, SpecError::InvalidValue { .. })),
    ("expireAfterWrite=ten minutes", |e| matches!(e, SpecError::InvalidValue { .. })),
    ("concurrencyLevel=0", |e| matches!(e, SpecError::InvalidValue { .. })),
    ("recordStats=true", |e| matches!(e, SpecError::UnexpectedValue { .. })),
    ("recordStats,recordStats", |e| matches!(e, SpecError::Duplicate { .. })),
    ("softValues", |e| matches!(e, SpecError::Unsupported { .. })),
    ("maximumWeight=100", |e| matches!(e, SpecError::Unsupported { .. })),
    ("colour=blue", |e| matches!(e, SpecError::UnknownOption { .. })),
  ];

  for (spec, expected) in cases {
    match CacheSpec::parse(spec) {
      Ok(parsed) => panic!("'{spec}' should not parse, got {parsed:?}"),
      Err(err) => assert!(expected(&err), "'{spec}' failed with unexpected error: {err}"),
    }
  }
}

#[test]
fn test_errors_name_the_offending_option() {
  let err = CacheSpec::parse("maximumSize=lots").unwrap_err();
  let message = err.to_string();
  assert!(message.contains("maximumSize"), "{message}");
  assert!(message.contains("lots"), "{message}");
}

#[test]
fn test_one_bad_name_does_not_affect_others() {
  let properties = CacheProperties::new()
    .with("good", "maximumSize=5")
    .with("bad", "maximumSize=five");

  assert!(properties.resolve("bad").is_err());
  assert_eq!(properties.resolve("good").unwrap().maximum_size, Some(5));
}

#[test]
fn test_properties_from_map_and_extend() {
  let mut map = HashMap::new();
  map.insert("a".to_string(), "maximumSize=1".to_string());
  let mut properties = CacheProperties::from(map);
  properties.extend([("b", "maximumSize=2")]);

  assert_eq!(properties.len(), 2);
  assert_eq!(properties.get("b"), Some("maximumSize=2"));
  assert_eq!(properties.insert("a", "maximumSize=3"), Some("maximumSize=1".to_string()));
  assert_eq!(properties.resolve("a").unwrap().maximum_size, Some(3));
}

#[cfg(feature = "serde")]
#[test]
fn test_properties_deserialize_from_a_flat_map() {
  let json = r#"{ "prices": "maximumSize=100,refreshAfterWrite=1s", "users": "" }"#;
  let properties: CacheProperties = serde_json::from_str(json).unwrap();

  assert_eq!(properties.len(), 2);
  assert_eq!(
    properties.resolve("prices").unwrap().refresh_after_write,
    Some(Duration::from_secs(1))
  );
  // An empty spec means no bounds at all.
  assert_eq!(properties.resolve("users").unwrap(), CacheSpec::default());

  let back = serde_json::to_value(&properties).unwrap();
  assert_eq!(back["users"], "");
}
