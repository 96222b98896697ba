use crate::channel::{Observer, ObserverId};
use crate::message::Message;

use parking_lot::{Mutex, ReentrantMutex};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

struct Registration {
  id: ObserverId,
  observer: Arc<dyn Observer>,
  // Set once the observer consumed its interest or was deregistered.
  // A retired registration is never invoked again.
  retired: AtomicBool,
}

impl Registration {
  /// Marks the registration retired. Returns `true` for the caller that
  /// performed the transition.
  #[inline]
  fn retire(&self) -> bool {
    !self.retired.swap(true, Ordering::AcqRel)
  }

  #[inline]
  fn is_retired(&self) -> bool {
    self.retired.load(Ordering::Acquire)
  }
}

/// The observer list of one channel.
///
/// Delivery walks a snapshot of the live list while holding `delivery`, then
/// prunes the registrations that retired during the walk. `observe` only
/// touches the live list, so it may run concurrently with a walk (or from
/// inside an observer callback) without being lost. Registrations added
/// during a walk are not part of its snapshot.
pub(crate) struct ObserverRegistry {
  delivery: ReentrantMutex<()>,
  live: Mutex<Vec<Arc<Registration>>>,
  live_count: AtomicUsize,
  next_id: AtomicU64,
}

impl fmt::Debug for ObserverRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObserverRegistry")
      .field("live", &self.len())
      .finish_non_exhaustive()
  }
}

impl Default for ObserverRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl ObserverRegistry {
  pub(crate) fn new() -> Self {
    Self {
      delivery: ReentrantMutex::new(()),
      live: Mutex::new(Vec::new()),
      live_count: AtomicUsize::new(0),
      next_id: AtomicU64::new(1),
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.live_count.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub(crate) fn register(&self, observer: Arc<dyn Observer>) -> ObserverId {
    let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let mut live = self.live.lock();
    live.push(Arc::new(Registration {
      id,
      observer,
      retired: AtomicBool::new(false),
    }));
    self.live_count.store(live.len(), Ordering::Release);
    id
  }

  /// Removes the observer registered under `id`.
  ///
  /// Returns `true` if it was still registered. When this returns, no walk on
  /// another thread is invoking the observer and none ever will again.
  pub(crate) fn deregister(&self, id: ObserverId) -> bool {
    let removed = {
      let mut live = self.live.lock();
      match live.iter().position(|r| r.id == id) {
        Some(pos) => {
          let registration = live.remove(pos);
          self.live_count.store(live.len(), Ordering::Release);
          registration.retire()
        }
        None => false,
      }
    };

    // A walk in flight may hold the registration in its snapshot. Its
    // retired flag keeps it from being invoked later; the fence waits out a
    // callback already running. Reentrant, so callbacks may deregister.
    drop(self.delivery.lock());
    removed
  }

  /// Runs `enqueue(message)` and then notifies every live observer.
  ///
  /// Both steps happen under the delivery lock, so observers of one channel
  /// see messages in queue order, and the message is already poppable when
  /// observers run. Returns the number of observers that consumed their
  /// interest.
  pub(crate) fn publish<F>(&self, message: Message, enqueue: F) -> usize
  where
    F: FnOnce(Message),
  {
    if self.is_empty() {
      enqueue(message);
      return 0;
    }

    let _delivery = self.delivery.lock();
    enqueue(message.clone());

    let snapshot: Vec<Arc<Registration>> = self.live.lock().clone();
    let mut consumed = 0;
    for registration in &snapshot {
      if registration.is_retired() {
        continue;
      }
      if registration.observer.pushed(&message) && registration.retire() {
        tracing::trace!(
          observer = registration.id.0,
          kind = message.kind(),
          key = message.key(),
          "observer consumed"
        );
        consumed += 1;
      }
    }

    if consumed > 0 {
      let mut live = self.live.lock();
      live.retain(|r| !r.is_retired());
      self.live_count.store(live.len(), Ordering::Release);
    }
    consumed
  }
}
