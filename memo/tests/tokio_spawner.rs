mod common;

use common::CallCounter;
use fibre_memo::{CacheBuilder, ExecuteError, Executor, LoadingCache, TokioSpawner};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tasks_run_on_the_blocking_pool() {
  let spawner = TokioSpawner::new();
  let (tx, rx) = tokio::sync::oneshot::channel();
  spawner
    .execute(Box::new(move || {
      let _ = tx.send(std::thread::current().id());
    }))
    .unwrap();

  let worker = tokio::time::timeout(Duration::from_secs(5), rx)
    .await
    .expect("task should run")
    .unwrap();
  assert_ne!(worker, std::thread::current().id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_rejects_new_tasks() {
  let spawner = TokioSpawner::new();
  spawner.shutdown();
  assert_eq!(spawner.execute(Box::new(|| {})), Err(ExecuteError::Shutdown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refreshes_run_on_tokio() {
  let cache: LoadingCache<u32, usize> = CacheBuilder::new()
    .refresh_after_write(Duration::from_millis(20))
    .executor(Arc::new(TokioSpawner::new()))
    .build();
  let counter = CallCounter::new();
  let load = |counter: &CallCounter| {
    let counter = counter.clone();
    move || Ok::<_, String>(counter.tick())
  };

  assert_eq!(cache.get_or_load(1, load(&counter)), Ok(1));
  tokio::time::sleep(Duration::from_millis(40)).await;
  assert_eq!(cache.get_or_load(1, load(&counter)), Ok(1));

  let mut refreshed = false;
  for _ in 0..100 {
    if cache.get_if_present(&1) == Some(2) {
      refreshed = true;
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert!(refreshed, "the refresh should land");
}
