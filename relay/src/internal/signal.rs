use futures_util::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};

use std::fmt;
use std::task::Waker;
use std::time::Instant;

/// A manual-reset event: once set it stays set until [`Signal::reset`].
///
/// Blocking waiters sleep on a condition variable. An async waiter can park
/// one waker that is woken on `set`.
pub(crate) struct Signal {
  state: Mutex<bool>,
  cond: Condvar,
  waker: AtomicWaker,
}

impl fmt::Debug for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Signal")
      .field("set", &self.is_set())
      .finish_non_exhaustive()
  }
}

impl Default for Signal {
  fn default() -> Self {
    Self::new()
  }
}

impl Signal {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(false),
      cond: Condvar::new(),
      waker: AtomicWaker::new(),
    }
  }

  pub(crate) fn set(&self) {
    {
      let mut set = self.state.lock();
      if !*set {
        *set = true;
        self.cond.notify_all();
      }
    }
    self.waker.wake();
  }

  pub(crate) fn reset(&self) {
    *self.state.lock() = false;
  }

  #[inline]
  pub(crate) fn is_set(&self) -> bool {
    *self.state.lock()
  }

  /// Blocks until the signal is set or `deadline` passes. `None` waits forever.
  /// Returns the state observed on wake-up.
  pub(crate) fn wait(&self, deadline: Option<Instant>) -> bool {
    let mut set = self.state.lock();
    match deadline {
      None => {
        while !*set {
          self.cond.wait(&mut set);
        }
      }
      Some(deadline) => {
        while !*set {
          if self.cond.wait_until(&mut set, deadline).timed_out() {
            break;
          }
        }
      }
    }
    *set
  }

  /// Parks `waker` to be woken by the next `set`. Only the most recently
  /// registered waker is kept.
  #[inline]
  pub(crate) fn register(&self, waker: &Waker) {
    self.waker.register(waker);
  }
}
