use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, Thread, ThreadId};

/// A loader error with its concrete type erased so it can be handed to
/// waiters whose error type is only known at their call site.
pub(crate) type ErasedError = Arc<dyn Any + Send + Sync>;

/// How an in-flight load ended.
pub(crate) enum Outcome<V> {
  Loaded(V),
  Failed(ErasedError),
  /// The loading thread panicked before producing anything.
  Abandoned,
}

impl<V: Clone> Clone for Outcome<V> {
  fn clone(&self) -> Self {
    match self {
      Outcome::Loaded(value) => Outcome::Loaded(value.clone()),
      Outcome::Failed(err) => Outcome::Failed(Arc::clone(err)),
      Outcome::Abandoned => Outcome::Abandoned,
    }
  }
}

enum State<V> {
  Computing,
  Complete(Outcome<V>),
}

struct Inner<V> {
  state: State<V>,
  waiters: VecDeque<Thread>,
}

/// The single in-flight load for one key.
///
/// Exactly one caller (the leader) runs the loader and completes the future;
/// every other caller for that key parks in [`LoadFuture::wait`].
pub(crate) struct LoadFuture<V> {
  inner: Mutex<Inner<V>>,
  leader: ThreadId,
}

impl<V: Clone> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the "Computing" state, led by the
  /// calling thread.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Computing,
        waiters: VecDeque::new(),
      }),
      leader: thread::current().id(),
    }
  }

  /// `true` on the thread running the loader. Waiting there would never wake.
  pub(crate) fn is_led_by_current_thread(&self) -> bool {
    self.leader == thread::current().id()
  }

  /// Publishes the outcome and wakes all waiters. Only the first call counts.
  pub(crate) fn complete(&self, outcome: Outcome<V>) {
    let mut inner = self.inner.lock();
    if matches!(inner.state, State::Complete(_)) {
      return;
    }
    inner.state = State::Complete(outcome);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks the calling thread until the leader completes the load.
  pub(crate) fn wait(&self) -> Outcome<V> {
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        State::Complete(outcome) => return outcome.clone(),
        State::Computing => {
          inner.waiters.push_back(thread::current());
          // Unlock before parking; spurious wakeups just loop.
          drop(inner);
          thread::park();
          inner = self.inner.lock();
        }
      }
    }
  }
}

/// Completes a load as [`Outcome::Abandoned`] if the leader unwinds before
/// publishing a result.
pub(crate) struct AbandonOnUnwind<'a, V: Clone> {
  future: &'a LoadFuture<V>,
  armed: bool,
  on_abandon: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a, V: Clone> AbandonOnUnwind<'a, V> {
  pub(crate) fn new(future: &'a LoadFuture<V>, on_abandon: impl FnOnce() + 'a) -> Self {
    Self {
      future,
      armed: true,
      on_abandon: Some(Box::new(on_abandon)),
    }
  }

  pub(crate) fn disarm(mut self) {
    self.armed = false;
  }
}

impl<V: Clone> Drop for AbandonOnUnwind<'_, V> {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    if let Some(cleanup) = self.on_abandon.take() {
      cleanup();
    }
    self.future.complete(Outcome::Abandoned);
  }
}
