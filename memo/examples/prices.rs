use fibre_memo::{args, CacheProperties, Memoizer, StatsRegistry};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fibre_memo=debug")),
    )
    .init();

  let stats = Arc::new(StatsRegistry::new());
  let memo = Memoizer::builder()
    .properties(
      CacheProperties::new()
        .with("prices", "maximumSize=100,refreshAfterWrite=1s")
        .with("broken", "maximumSize=many"),
    )
    .stats_registry(Arc::clone(&stats))
    .build();

  // Every fetch returns a higher price so refreshes are visible.
  let ticks = Arc::new(AtomicU32::new(100));
  let fetch_price = {
    let ticks = Arc::clone(&ticks);
    move || {
      thread::sleep(Duration::from_millis(200));
      let price = ticks.fetch_add(1, Ordering::SeqCst);
      println!("[Backend] fetched ACME at {price}");
      Ok::<_, String>(price)
    }
  };

  println!("--- Step 1: First call loads ---");
  let price = memo.result("prices", &args!["ACME"], fetch_price.clone());
  println!("Received: {price:?}");

  println!("\n--- Step 2: Second call is a hit ---");
  let price = memo.result("prices", &args!["ACME"], fetch_price.clone());
  println!("Received: {price:?}");

  println!("\n--- Step 3: After the refresh interval the old price is served once ---");
  thread::sleep(Duration::from_millis(1200));
  let price = memo.result("prices", &args!["ACME"], fetch_price.clone());
  println!("Received (stale, refresh scheduled): {price:?}");

  thread::sleep(Duration::from_millis(400));
  let price = memo.result("prices", &args!["ACME"], fetch_price.clone());
  println!("Received (refreshed): {price:?}");

  println!("\n--- Step 4: A broken spec only disables its own cache ---");
  let price = memo.result("broken", &args!["ACME"], fetch_price);
  println!("Received (uncached): {price:?}");

  println!("\n--- Statistics ---");
  if let Some(bean) = stats.lookup("prices") {
    println!("{}: {:#?}", bean.object_name(), bean.snapshot());
  }

  memo.shutdown();
}
