//! Blocking wait-for-match on a single channel.

use crate::channel::{Channel, Observer, ObserverId};
use crate::internal::signal::Signal;
use crate::message::Message;
use crate::pattern::{self, Significance};
use crate::sync_util;

use parking_lot::Mutex;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

struct Interest {
  prototype: Message,
  significance: Significance,
}

/// The part of a waiter the channel holds on to.
struct WaitState {
  interest: Mutex<Interest>,
  signal: Signal,
}

impl Observer for WaitState {
  fn pushed(&self, message: &Message) -> bool {
    let interest = self.interest.lock();
    if pattern::matches(message, &interest.prototype, interest.significance) {
      self.signal.set();
      true
    } else {
      false
    }
  }
}

/// Waits until a message matching a prototype is pushed to one channel.
///
/// A waiter is either ARMED (registered with the channel, signal unset) or
/// SATISFIED (a matching push was observed). [`set_wait`](Self::set_wait)
/// arms it; the matching push satisfies it. Only pushes made after arming
/// count: a matching message already sitting in the queue does not.
///
/// Satisfying the waiter does not take the message off the channel; pop it
/// as usual after [`wait`](Self::wait) returns.
///
/// ```
/// use fibre_relay::{Channel, ChannelWait, Message, Significance};
/// use std::time::Duration;
///
/// let channel = Channel::create();
/// let waiter = ChannelWait::new(channel.clone());
/// waiter.set_wait(
///   Message::without_payload(5, 42),
///   Significance::TYPE | Significance::INTEGRAL,
/// );
///
/// let producer = {
///   let channel = channel.clone();
///   std::thread::spawn(move || channel.push(5, 42, "x"))
/// };
///
/// waiter.wait(Some(Duration::from_secs(5)));
/// assert!(waiter.done());
/// producer.join().unwrap();
/// ```
pub struct ChannelWait {
  channel: Arc<Channel>,
  state: Arc<WaitState>,
  registration: Mutex<Option<ObserverId>>,
}

impl fmt::Debug for ChannelWait {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelWait")
      .field("channel", &self.channel)
      .field("done", &self.done())
      .finish_non_exhaustive()
  }
}

impl ChannelWait {
  /// Creates an unarmed waiter bound to `channel`.
  pub fn new(channel: Arc<Channel>) -> Self {
    Self {
      channel,
      state: Arc::new(WaitState {
        interest: Mutex::new(Interest {
          prototype: Message::empty(),
          significance: Significance::NONE,
        }),
        signal: Signal::new(),
      }),
      registration: Mutex::new(None),
    }
  }

  /// The channel this waiter observes.
  #[inline]
  pub fn channel(&self) -> &Arc<Channel> {
    &self.channel
  }

  /// Arms the waiter for the next push matching `prototype` under
  /// `significance`. Any previous interest is dropped, whether or not it was
  /// satisfied.
  pub fn set_wait(&self, prototype: Message, significance: Significance) {
    let mut registration = self.registration.lock();
    if let Some(id) = registration.take() {
      self.channel.unobserve(id);
    }

    *self.state.interest.lock() = Interest {
      prototype,
      significance,
    };
    self.state.signal.reset();

    *registration = Some(self.channel.observe(self.state.clone()));
  }

  /// Blocks until the waiter is satisfied or `timeout` elapses. `None`
  /// blocks indefinitely.
  ///
  /// Does not report which of the two happened; ask [`done`](Self::done).
  pub fn wait(&self, timeout: Option<Duration>) {
    self.state.signal.wait(sync_util::deadline_after(timeout));
  }

  /// Returns a future that resolves once the waiter is satisfied.
  ///
  /// Only one task should await a given waiter at a time.
  pub fn wait_async(&self) -> WaitFuture<'_> {
    WaitFuture { waiter: self }
  }

  /// Returns `true` once a matching push has been observed.
  #[inline]
  pub fn done(&self) -> bool {
    self.state.signal.is_set()
  }

  /// Stops observing the channel. The satisfied state, if reached, is kept.
  pub fn cancel(&self) {
    if let Some(id) = self.registration.lock().take() {
      self.channel.unobserve(id);
    }
  }
}

impl Drop for ChannelWait {
  fn drop(&mut self) {
    if let Some(id) = self.registration.get_mut().take() {
      self.channel.unobserve(id);
    }
  }
}

/// Future returned by [`ChannelWait::wait_async`].
#[must_use = "futures do nothing unless you .await or poll them"]
#[derive(Debug)]
pub struct WaitFuture<'a> {
  waiter: &'a ChannelWait,
}

impl Future for WaitFuture<'_> {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    let signal = &self.waiter.state.signal;
    if signal.is_set() {
      return Poll::Ready(());
    }
    signal.register(cx.waker());
    // Re-check: a set between the first check and registering the waker
    // would otherwise be missed.
    if signal.is_set() {
      Poll::Ready(())
    } else {
      Poll::Pending
    }
  }
}
