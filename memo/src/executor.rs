//! Executors that run background refreshes.
//!
//! Refreshes never run on the calling thread. A cache hands each one to an
//! [`Executor`] and carries on serving the current value.

use crate::error::ExecuteError;

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks away from the thread that submitted them.
pub trait Executor: Send + Sync + 'static {
  /// Submits a task. Fails once the executor has been shut down.
  fn execute(&self, task: Task) -> Result<(), ExecuteError>;

  /// Stops accepting new tasks. Tasks already accepted still run.
  fn shutdown(&self);
}

static SHARED_POOL: Lazy<Arc<CachedThreadPool>> =
  Lazy::new(|| Arc::new(CachedThreadPool::new("fibre-memo-refresh")));

/// The process-wide pool used by caches built without an explicit executor.
pub(crate) fn shared_pool() -> Arc<dyn Executor> {
  let pool: Arc<CachedThreadPool> = Arc::clone(&SHARED_POOL);
  pool
}

struct PoolState {
  tasks: VecDeque<Task>,
  idle: usize,
  workers: usize,
  shutdown: bool,
}

struct PoolShared {
  name: String,
  keep_alive: Duration,
  stack_size: Option<usize>,
  next_worker: AtomicUsize,
  state: Mutex<PoolState>,
  work_available: Condvar,
  terminated: Condvar,
}

/// An unbounded pool that starts a thread whenever no idle worker can take a
/// task, and lets threads exit after sitting idle for the keep-alive period.
pub struct CachedThreadPool {
  shared: Arc<PoolShared>,
}

impl CachedThreadPool {
  pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

  /// Creates a pool whose threads are named `<name>-<n>`.
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_keep_alive(name, Self::DEFAULT_KEEP_ALIVE)
  }

  pub fn with_keep_alive(name: impl Into<String>, keep_alive: Duration) -> Self {
    Self {
      shared: Arc::new(PoolShared {
        name: name.into(),
        keep_alive,
        stack_size: None,
        next_worker: AtomicUsize::new(0),
        state: Mutex::new(PoolState {
          tasks: VecDeque::new(),
          idle: 0,
          workers: 0,
          shutdown: false,
        }),
        work_available: Condvar::new(),
        terminated: Condvar::new(),
      }),
    }
  }

  /// Sets the stack size of worker threads started from now on.
  pub fn stack_size(mut self, bytes: usize) -> Self {
    if let Some(shared) = Arc::get_mut(&mut self.shared) {
      shared.stack_size = Some(bytes);
    }
    self
  }

  /// Number of live worker threads.
  pub fn worker_count(&self) -> usize {
    self.shared.state.lock().workers
  }

  pub fn is_shutdown(&self) -> bool {
    self.shared.state.lock().shutdown
  }

  /// Blocks until every worker has exited or `timeout` passes.
  /// Returns `true` if the pool is fully terminated.
  pub fn await_termination(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut state = self.shared.state.lock();
    while !(state.shutdown && state.workers == 0 && state.tasks.is_empty()) {
      if self
        .shared
        .terminated
        .wait_until(&mut state, deadline)
        .timed_out()
      {
        return state.shutdown && state.workers == 0 && state.tasks.is_empty();
      }
    }
    true
  }

  /// Starts a worker that runs `first` before taking queued tasks. The caller
  /// has already counted the worker. If the thread cannot be started, `first`
  /// is dropped and the count is given back.
  fn spawn_worker(&self, first: Task) -> Result<(), ExecuteError> {
    let shared = Arc::clone(&self.shared);
    let id = self.shared.next_worker.fetch_add(1, Ordering::Relaxed);
    let mut builder = thread::Builder::new().name(format!("{}-{}", self.shared.name, id));
    if let Some(bytes) = self.shared.stack_size {
      builder = builder.stack_size(bytes);
    }

    match builder.spawn(move || worker_loop(shared, first)) {
      Ok(_) => Ok(()),
      Err(err) => {
        let mut state = self.shared.state.lock();
        state.workers -= 1;
        if state.workers == 0 {
          self.shared.terminated.notify_all();
        }
        drop(state);
        tracing::error!(pool = %self.shared.name, error = %err, "could not start worker thread");
        Err(ExecuteError::SpawnFailed)
      }
    }
  }
}

fn run_task(shared: &PoolShared, task: Task) {
  if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
    tracing::warn!(pool = %shared.name, "background task panicked");
  }
}

fn worker_loop(shared: Arc<PoolShared>, first: Task) {
  tracing::trace!(pool = %shared.name, "worker started");
  run_task(&shared, first);

  let mut state = shared.state.lock();
  loop {
    if let Some(task) = state.tasks.pop_front() {
      drop(state);
      run_task(&shared, task);
      state = shared.state.lock();
      continue;
    }

    if state.shutdown {
      break;
    }

    state.idle += 1;
    let timed_out = shared
      .work_available
      .wait_for(&mut state, shared.keep_alive)
      .timed_out();
    state.idle -= 1;

    if timed_out && state.tasks.is_empty() {
      break;
    }
  }

  state.workers -= 1;
  if state.workers == 0 {
    shared.terminated.notify_all();
  }
  tracing::trace!(pool = %shared.name, "worker exited");
}

impl Executor for CachedThreadPool {
  fn execute(&self, task: Task) -> Result<(), ExecuteError> {
    let mut state = self.shared.state.lock();
    if state.shutdown {
      return Err(ExecuteError::Shutdown);
    }

    // Queue only what idle workers can pick up; otherwise start a worker
    // with the task in hand.
    if state.tasks.len() < state.idle {
      state.tasks.push_back(task);
      drop(state);
      self.shared.work_available.notify_one();
      return Ok(());
    }
    state.workers += 1;
    drop(state);
    self.spawn_worker(task)
  }

  fn shutdown(&self) {
    let mut state = self.shared.state.lock();
    if state.shutdown {
      return;
    }
    state.shutdown = true;
    let quiet = state.workers == 0;
    drop(state);

    tracing::debug!(pool = %self.shared.name, "shutting down");
    self.shared.work_available.notify_all();
    if quiet {
      self.shared.terminated.notify_all();
    }
  }
}

impl fmt::Debug for CachedThreadPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("CachedThreadPool")
      .field("name", &self.shared.name)
      .field("workers", &state.workers)
      .field("idle", &state.idle)
      .field("queued", &state.tasks.len())
      .field("shutdown", &state.shutdown)
      .finish()
  }
}

/// Runs refreshes on a Tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
pub struct TokioSpawner {
  handle: tokio::runtime::Handle,
  shutdown: std::sync::atomic::AtomicBool,
}

#[cfg(feature = "tokio")]
impl TokioSpawner {
  /// Creates a spawner that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self::from_handle(tokio::runtime::Handle::current())
  }

  pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
    Self {
      handle,
      shutdown: std::sync::atomic::AtomicBool::new(false),
    }
  }
}

#[cfg(feature = "tokio")]
impl Executor for TokioSpawner {
  fn execute(&self, task: Task) -> Result<(), ExecuteError> {
    if self.shutdown.load(Ordering::Acquire) {
      return Err(ExecuteError::Shutdown);
    }
    // Loaders are blocking code.
    self.handle.spawn_blocking(task);
    Ok(())
  }

  fn shutdown(&self) {
    self.shutdown.store(true, Ordering::Release);
  }
}

#[cfg(feature = "tokio")]
impl fmt::Debug for TokioSpawner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokioSpawner")
      .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}
