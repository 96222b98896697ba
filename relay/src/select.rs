//! Selective receive across several channels.
//!
//! Every function scans channels in the order given. Scans are not atomic as
//! a whole and make no fairness promise: a busy channel early in the list can
//! starve later ones, so rotate the order if that matters.

use crate::channel::{Channel, Observer, ObserverId};
use crate::internal::head_watch::HeadWatchId;
use crate::internal::signal::Signal;
use crate::message::Message;
use crate::pattern::{self, Significance};
use crate::sync_util;

use std::sync::Arc;
use std::time::Duration;

/// Pops the first available message. Returns the message and the index of
/// the channel it came from, or the empty sentinel and `None`.
pub fn pick<C: AsRef<Channel>>(channels: &[C]) -> (Message, Option<usize>) {
  for (index, channel) in channels.iter().enumerate() {
    let message = channel.as_ref().pop();
    if !message.is_empty() {
      return (message, Some(index));
    }
  }
  (Message::empty(), None)
}

/// Like [`pick`], but each channel only yields its head if that matches
/// `prototype` under `significance`.
pub fn pick_matching<C: AsRef<Channel>>(
  channels: &[C],
  prototype: &Message,
  significance: Significance,
) -> (Message, Option<usize>) {
  for (index, channel) in channels.iter().enumerate() {
    let message = channel.as_ref().pop_matching(prototype, significance);
    if !message.is_empty() {
      return (message, Some(index));
    }
  }
  (Message::empty(), None)
}

/// Drains every channel in turn into `callback`, one channel completely
/// before the next. Returns the total number of messages processed.
pub fn process<C, F>(channels: &[C], mut callback: F) -> usize
where
  C: AsRef<Channel>,
  F: FnMut(Message),
{
  channels
    .iter()
    .map(|channel| channel.as_ref().process(&mut callback))
    .sum()
}

/// Blocking [`pick_matching`]: waits until one of `channels` yields a
/// matching head or `timeout` elapses (`None` waits forever).
///
/// On timeout returns the empty sentinel and `None`. A matching message
/// queued behind a non-matching head is not delivered, as with
/// [`Channel::pop_matching`]. The call wakes both on matching pushes and on
/// pops by other consumers that leave a new head at the front, so a match
/// uncovered that way is returned without waiting for the timeout.
pub fn wait_pick<C: AsRef<Channel>>(
  channels: &[C],
  prototype: &Message,
  significance: Significance,
  timeout: Option<Duration>,
) -> (Message, Option<usize>) {
  let deadline = sync_util::deadline_after(timeout);
  let watch = Watch::register(channels, prototype, significance);

  loop {
    watch.wake.signal.reset();
    let picked = pick_matching(channels, prototype, significance);
    if picked.1.is_some() {
      return picked;
    }
    if !watch.wake.signal.wait(deadline) {
      return (Message::empty(), None);
    }
  }
}

/// Sets the shared signal on every matching push, without consuming.
struct PickWake {
  prototype: Message,
  significance: Significance,
  signal: Arc<Signal>,
}

impl Observer for PickWake {
  fn pushed(&self, message: &Message) -> bool {
    if pattern::matches(message, &self.prototype, self.significance) {
      self.signal.set();
    }
    false
  }
}

/// Push observer and head-watch registrations held for the duration of one
/// `wait_pick`.
struct Watch<'a, C: AsRef<Channel>> {
  channels: &'a [C],
  ids: Vec<(ObserverId, HeadWatchId)>,
  wake: Arc<PickWake>,
}

impl<'a, C: AsRef<Channel>> Watch<'a, C> {
  fn register(channels: &'a [C], prototype: &Message, significance: Significance) -> Self {
    let wake = Arc::new(PickWake {
      prototype: prototype.clone(),
      significance,
      signal: Arc::new(Signal::new()),
    });
    let ids = channels
      .iter()
      .map(|channel| {
        let channel = channel.as_ref();
        (
          channel.observe(wake.clone()),
          channel.watch_head(wake.signal.clone()),
        )
      })
      .collect();
    Self {
      channels,
      ids,
      wake,
    }
  }
}

impl<C: AsRef<Channel>> Drop for Watch<'_, C> {
  fn drop(&mut self) {
    for (channel, (observer, head)) in self.channels.iter().zip(self.ids.drain(..)) {
      channel.as_ref().unobserve(observer);
      channel.as_ref().unwatch_head(head);
    }
  }
}
