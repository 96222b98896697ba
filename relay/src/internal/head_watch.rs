use crate::internal::signal::Signal;

use parking_lot::Mutex;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Identifies one signal registered with a [`HeadWatchers`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeadWatchId(u64);

/// Signals to set whenever a pop exposes a new head.
///
/// Push observers only see new tails. A consumer blocked on a head-only match
/// also needs to hear when someone else pops a non-matching head and leaves
/// another message at the front.
pub(crate) struct HeadWatchers {
  watchers: Mutex<Vec<(HeadWatchId, Arc<Signal>)>>,
  count: AtomicUsize,
  next_id: AtomicU64,
}

impl fmt::Debug for HeadWatchers {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HeadWatchers")
      .field("count", &self.len())
      .finish_non_exhaustive()
  }
}

impl Default for HeadWatchers {
  fn default() -> Self {
    Self::new()
  }
}

impl HeadWatchers {
  pub(crate) fn new() -> Self {
    Self {
      watchers: Mutex::new(Vec::new()),
      count: AtomicUsize::new(0),
      next_id: AtomicU64::new(1),
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.count.load(Ordering::Acquire)
  }

  pub(crate) fn add(&self, signal: Arc<Signal>) -> HeadWatchId {
    let id = HeadWatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let mut watchers = self.watchers.lock();
    watchers.push((id, signal));
    self.count.store(watchers.len(), Ordering::Release);
    id
  }

  pub(crate) fn remove(&self, id: HeadWatchId) -> bool {
    let mut watchers = self.watchers.lock();
    let before = watchers.len();
    watchers.retain(|(watch, _)| *watch != id);
    self.count.store(watchers.len(), Ordering::Release);
    watchers.len() != before
  }

  /// Sets every registered signal. Must not be called with the queue locked.
  pub(crate) fn notify(&self) {
    if self.len() == 0 {
      return;
    }
    let snapshot: Vec<Arc<Signal>> = self
      .watchers
      .lock()
      .iter()
      .map(|(_, signal)| signal.clone())
      .collect();
    for signal in snapshot {
      signal.set();
    }
  }
}
