mod common;

use common::{isolated_memoizer, CallCounter};
use fibre_memo::{args, CacheProperties, CallArgs};
use std::sync::{Arc, Barrier};
use std::thread;

fn counting(counter: &CallCounter) -> impl Fn() -> Result<usize, String> + Send + Sync + 'static {
  let counter = counter.clone();
  move || Ok(counter.tick())
}

#[test]
fn test_unconfigured_names_always_invoke() {
  let (memo, _) = isolated_memoizer(CacheProperties::new());
  let counter = CallCounter::new();

  let results: Vec<_> = (0..3)
    .map(|_| memo.result("unconfigured", &args![1_u8], counting(&counter)))
    .collect();

  assert_eq!(results, vec![Ok(1), Ok(2), Ok(3)]);
  let cache = memo.cache("unconfigured").unwrap();
  assert!(cache.spec().is_disabled());
  assert_eq!(cache.size(), 0);
}

#[test]
fn test_configured_names_cache_per_argument_list() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("users", "maximumSize=100"));
  let counter = CallCounter::new();

  assert_eq!(memo.result("users", &args![1_u64], counting(&counter)), Ok(1));
  assert_eq!(memo.result("users", &args![1_u64], counting(&counter)), Ok(1));
  assert_eq!(memo.result("users", &args![2_u64], counting(&counter)), Ok(2));
  assert_eq!(memo.result("users", &args![1_u64, 2_u64], counting(&counter)), Ok(3));
  assert_eq!(counter.count(), 3);
  assert_eq!(memo.cache("users").unwrap().size(), 3);
}

#[test]
fn test_operation_errors_propagate_and_are_not_cached() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("flaky", "maximumSize=10"));
  let counter = CallCounter::new();
  let flaky = {
    let counter = counter.clone();
    move || match counter.tick() {
      1 => Err("first call fails".to_string()),
      n => Ok(n),
    }
  };

  assert_eq!(memo.result("flaky", &args![], flaky.clone()), Err("first call fails".to_string()));
  assert_eq!(memo.result("flaky", &args![], flaky.clone()), Ok(2));
  assert_eq!(memo.result("flaky", &args![], flaky), Ok(2));
}

#[test]
fn test_first_use_builds_exactly_one_cache() {
  let (memo, stats) = isolated_memoizer(CacheProperties::new().with("shared", "maximumSize=100"));
  let num_threads = 16;
  let barrier = Arc::new(Barrier::new(num_threads));

  let handles: Vec<_> = (0..num_threads)
    .map(|i| {
      let memo = memo.clone();
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        barrier.wait();
        memo.put("shared", &args![i], || Ok::<_, String>(i)).unwrap();
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  // Every thread wrote into the same instance.
  assert_eq!(memo.cache("shared").unwrap().size(), num_threads as u64);
  assert_eq!(memo.registry().names(), vec!["shared".to_string()]);
  assert_eq!(stats.len(), 1);
}

#[test]
fn test_broken_spec_degrades_to_direct_invocation() {
  common::init_tracing();
  let (memo, stats) = isolated_memoizer(
    CacheProperties::new()
      .with("broken", "maximumSize=lots")
      .with("healthy", "maximumSize=10"),
  );
  let counter = CallCounter::new();

  assert_eq!(memo.result("broken", &args![], counting(&counter)), Ok(1));
  assert_eq!(memo.result("broken", &args![], counting(&counter)), Ok(2));
  assert_eq!(memo.put("broken", &args![], || Ok::<_, String>(99)), Ok(99));
  assert!(memo.cache("broken").is_none());
  assert!(memo.registry().is_unavailable("broken"));
  assert!(stats.lookup("broken").is_none());

  let healthy = CallCounter::new();
  assert_eq!(memo.result("healthy", &args![], counting(&healthy)), Ok(1));
  assert_eq!(memo.result("healthy", &args![], counting(&healthy)), Ok(1));
}

#[test]
fn test_unregistrable_name_degrades_to_direct_invocation() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("a,b", "maximumSize=10"));
  let counter = CallCounter::new();

  assert_eq!(memo.result("a,b", &args![], counting(&counter)), Ok(1));
  assert_eq!(memo.result("a,b", &args![], counting(&counter)), Ok(2));
  assert!(memo.registry().is_unavailable("a,b"));
}

#[test]
fn test_put_replaces_what_result_returns() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("prices", "maximumSize=10"));
  let key = args!["ACME"];

  assert_eq!(memo.result("prices", &key, || Ok::<_, String>(100_u32)), Ok(100));
  assert_eq!(memo.put("prices", &key, || Ok::<_, String>(105_u32)), Ok(105));
  assert_eq!(
    memo.result("prices", &key, || -> Result<u32, String> { panic!("should be cached") }),
    Ok(105)
  );

  let failed = memo.put("prices", &key, || Err::<u32, _>("feed down".to_string()));
  assert_eq!(failed, Err("feed down".to_string()));
  assert_eq!(
    memo.result("prices", &key, || -> Result<u32, String> { panic!("should be cached") }),
    Ok(105)
  );
}

#[test]
fn test_put_runs_the_operation_once_per_call() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("prices", "maximumSize=10"));
  let counter = CallCounter::new();
  let key = args!["ACME"];

  for expected in 1..=3 {
    let counter = counter.clone();
    assert_eq!(memo.put("prices", &key, move || Ok::<_, String>(counter.tick())), Ok(expected));
  }
  assert_eq!(counter.count(), 3);

  let cache = memo.cache("prices").unwrap();
  assert_eq!(cache.size(), 1);
  assert_eq!(cache.stats().request_count(), 0, "puts are not reads");
}

#[test]
fn test_remove_and_remove_all() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("items", "maximumSize=10"));
  let counter = CallCounter::new();

  memo.result("items", &args![1_u8], counting(&counter)).unwrap();
  memo.result("items", &args![2_u8], counting(&counter)).unwrap();
  memo.remove("items", &args![1_u8]);

  assert_eq!(memo.result("items", &args![1_u8], counting(&counter)), Ok(3));
  assert_eq!(memo.result("items", &args![2_u8], counting(&counter)), Ok(2));

  memo.remove_all("items");
  assert_eq!(memo.cache("items").unwrap().size(), 0);
  assert_eq!(memo.result("items", &args![2_u8], counting(&counter)), Ok(4));
}

#[test]
fn test_remove_on_unknown_names_does_nothing() {
  let (memo, _) = isolated_memoizer(CacheProperties::new());
  memo.remove("nobody", &args![1_u8]);
  memo.remove_all("nobody");
  assert!(memo.registry().names().is_empty());
}

#[test]
fn test_value_type_mismatch_invokes_directly() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("mixed", "maximumSize=10"));
  let key = CallArgs::new().with("id");

  assert_eq!(memo.result("mixed", &key, || Ok::<_, String>(1_u32)), Ok(1));
  assert_eq!(
    memo.result("mixed", &key, || Ok::<_, String>("text".to_string())),
    Ok("text".to_string())
  );
  // The original entry is untouched.
  assert_eq!(
    memo.result("mixed", &key, || -> Result<u32, String> { panic!("should be cached") }),
    Ok(1)
  );
}

#[test]
fn test_null_arguments_are_distinct_keys() {
  let (memo, _) = isolated_memoizer(CacheProperties::new().with("nullable", "maximumSize=10"));
  let counter = CallCounter::new();

  let with_null = CallArgs::new().with_null();
  let with_value = CallArgs::new().with(0_u8);
  assert_eq!(memo.result("nullable", &with_null, counting(&counter)), Ok(1));
  assert_eq!(memo.result("nullable", &with_value, counting(&counter)), Ok(2));
  assert_eq!(memo.result("nullable", &args![], counting(&counter)), Ok(3));
  assert_eq!(memo.result("nullable", &with_null, counting(&counter)), Ok(1));
}
