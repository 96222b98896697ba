//! The shared message queue.

use crate::internal::head_watch::{HeadWatchId, HeadWatchers};
use crate::internal::observers::ObserverRegistry;
use crate::internal::signal::Signal;
use crate::message::Message;
use crate::pattern::{self, Significance};

use parking_lot::Mutex;

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Something that wants to hear about every push to a channel.
///
/// `pushed` runs synchronously on the pushing thread, after the message is
/// already in the queue. Return `true` once interest is consumed: the
/// observer is then removed and never called again. Return `false` to keep
/// observing.
///
/// Callbacks should be short. Pushes to the same channel wait for the walk to
/// finish, and a callback that pushes to its own channel is re-entered.
///
/// # Deadlocks
///
/// A push holds its channel's delivery lock while callbacks run, and
/// [`Channel::unobserve`] waits on that lock. Observers on two channels that
/// push into (or unobserve from) each other can therefore deadlock when both
/// channels are pushed to concurrently. Keep cross-channel work out of
/// callbacks, or hand it to another thread.
pub trait Observer: Send + Sync {
  fn pushed(&self, message: &Message) -> bool;
}

impl<F> Observer for F
where
  F: Fn(&Message) -> bool + Send + Sync,
{
  #[inline]
  fn pushed(&self, message: &Message) -> bool {
    self(message)
  }
}

/// Identifies one registration made with [`Channel::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// An unbounded, thread-safe FIFO of [`Message`]s.
///
/// Channels are always shared through an `Arc` created by
/// [`Channel::create`]; every producer and consumer holds a clone and the
/// channel goes away with the last one. There is no close state: an empty
/// channel looks the same whether or not anyone will push again.
pub struct Channel {
  messages: Mutex<VecDeque<Message>>,
  observers: ObserverRegistry,
  head_watchers: HeadWatchers,
}

impl fmt::Debug for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
      .field("len", &self.len())
      .field("observers", &self.observers.len())
      .finish()
  }
}

impl AsRef<Channel> for Channel {
  #[inline]
  fn as_ref(&self) -> &Channel {
    self
  }
}

impl Channel {
  /// Creates a new, empty channel.
  pub fn create() -> Arc<Self> {
    Arc::new(Self {
      messages: Mutex::new(VecDeque::new()),
      observers: ObserverRegistry::new(),
      head_watchers: HeadWatchers::new(),
    })
  }

  /// Pushes a new message built from `kind`, `key` and `payload`.
  ///
  /// # Panics
  /// If `kind` is [`NULL_MESSAGE`](crate::NULL_MESSAGE).
  #[track_caller]
  pub fn push<T: Any + Send + Sync>(&self, kind: u32, key: u64, payload: T) {
    self.emplace(Message::new(kind, key, payload));
  }

  /// Pushes an already built message to the tail of the queue, then notifies
  /// observers.
  ///
  /// # Panics
  /// If `message` is the empty sentinel.
  pub fn emplace(&self, message: Message) {
    assert!(
      !message.is_empty(),
      "cannot push a message with the reserved NULL_MESSAGE kind"
    );
    self
      .observers
      .publish(message, |m| self.messages.lock().push_back(m));
  }

  /// Removes and returns the head, or the empty sentinel if there is none.
  pub fn pop(&self) -> Message {
    let (message, exposed) = {
      let mut messages = self.messages.lock();
      let message = messages.pop_front();
      (message, !messages.is_empty())
    };
    self.head_popped(message, exposed)
  }

  /// Removes and returns the head only if it matches `prototype` under
  /// `significance`.
  ///
  /// Only the head is inspected: a non-matching head hides matching messages
  /// behind it, and the queue is left untouched.
  pub fn pop_matching(&self, prototype: &Message, significance: Significance) -> Message {
    let (message, exposed) = {
      let mut messages = self.messages.lock();
      let message = match messages.front() {
        Some(head) if pattern::matches(head, prototype, significance) => messages.pop_front(),
        _ => None,
      };
      (message, !messages.is_empty())
    };
    self.head_popped(message, exposed)
  }

  // Wakes head watchers when a pop left a new message at the front.
  fn head_popped(&self, message: Option<Message>, exposed: bool) -> Message {
    match message {
      Some(message) => {
        if exposed {
          self.head_watchers.notify();
        }
        message
      }
      None => Message::empty(),
    }
  }

  /// Pops every currently available message into `callback`. Returns how
  /// many were processed.
  pub fn process<F>(&self, mut callback: F) -> usize
  where
    F: FnMut(Message),
  {
    let mut processed = 0;
    while let Some(message) = self.pop().into_option() {
      callback(message);
      processed += 1;
    }
    processed
  }

  /// Registers `observer` to be notified of every subsequent push.
  pub fn observe(&self, observer: Arc<dyn Observer>) -> ObserverId {
    self.observers.register(observer)
  }

  /// Deregisters an observer. Returns `false` if it already consumed its
  /// interest or was removed before.
  ///
  /// Once this returns the observer will not be called again, even by a push
  /// that was already running on another thread.
  pub fn unobserve(&self, id: ObserverId) -> bool {
    self.observers.deregister(id)
  }

  /// Sets `signal` whenever a pop leaves a new head in the queue.
  pub(crate) fn watch_head(&self, signal: Arc<Signal>) -> HeadWatchId {
    self.head_watchers.add(signal)
  }

  pub(crate) fn unwatch_head(&self, id: HeadWatchId) -> bool {
    self.head_watchers.remove(id)
  }

  #[cfg(test)]
  pub(crate) fn head_watch_count(&self) -> usize {
    self.head_watchers.len()
  }

  pub fn observer_count(&self) -> usize {
    self.observers.len()
  }

  pub fn len(&self) -> usize {
    self.messages.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.messages.lock().is_empty()
  }
}
