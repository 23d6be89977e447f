#![allow(dead_code)]

use fibre_memo::{CacheProperties, ExecuteError, Executor, Memoizer, StatsRegistry, Task};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Installs a test-friendly subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// A memoizer with its own statistics registry, so tests don't see each
/// other's registrations.
pub fn isolated_memoizer(properties: CacheProperties) -> (Memoizer, Arc<StatsRegistry>) {
  let stats = Arc::new(StatsRegistry::new());
  let memo = Memoizer::builder()
    .properties(properties)
    .stats_registry(Arc::clone(&stats))
    .build();
  (memo, stats)
}

/// Counts how many times an operation ran.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a call and returns its 1-based sequence number.
  pub fn tick(&self) -> usize {
    self.0.fetch_add(1, Ordering::SeqCst) + 1
  }

  pub fn count(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(5));
  }
  condition()
}

/// An executor that queues tasks until the test runs them.
#[derive(Default)]
pub struct ManualExecutor {
  tasks: Mutex<Vec<Task>>,
  shutdown: AtomicBool,
}

impl ManualExecutor {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn pending(&self) -> usize {
    self.tasks.lock().unwrap().len()
  }

  /// Runs every queued task on the calling thread and returns how many ran.
  pub fn run_all(&self) -> usize {
    let tasks: Vec<Task> = self.tasks.lock().unwrap().drain(..).collect();
    let count = tasks.len();
    for task in tasks {
      task();
    }
    count
  }
}

impl Executor for ManualExecutor {
  fn execute(&self, task: Task) -> Result<(), ExecuteError> {
    if self.shutdown.load(Ordering::SeqCst) {
      return Err(ExecuteError::Shutdown);
    }
    self.tasks.lock().unwrap().push(task);
    Ok(())
  }

  fn shutdown(&self) {
    self.shutdown.store(true, Ordering::SeqCst);
  }
}
