//! Typed, thread-safe message channels with selective receive.
//!
//! Fibre Relay decouples producer and consumer threads with shared,
//! unbounded [`Channel`]s of [`Message`]s. Consumers can pop unconditionally,
//! pop only a head that matches a prototype under a [`Significance`] mask,
//! [`pick`] across several channels, or block on a [`ChannelWait`] until a
//! matching message is pushed. A [`timer::Scheduler`] delivers messages after
//! a delay without keeping channels alive.

pub mod channel;
pub mod error;
pub mod message;
pub mod pattern;
pub mod select;
pub mod timer;
pub mod wait;

// Internal utilities - not part of public API
mod internal;
mod sync_util;

pub use channel::{Channel, Observer, ObserverId};
pub use error::{PayloadError, ScheduleError};
pub use message::{Message, Payload, NULL_MESSAGE, TIMER_FIRED};
pub use pattern::{matches, Significance};
pub use select::{pick, pick_matching, process, wait_pick};
pub use wait::{ChannelWait, WaitFuture};

// Helper function to check if a type is Send + Sync.
#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn assert_public_types_are_send_sync() {
  assert_send_sync::<Channel>();
  assert_send_sync::<Message>();
  assert_send_sync::<ChannelWait>();
  assert_send_sync::<timer::Scheduler>();
}
