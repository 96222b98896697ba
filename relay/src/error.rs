use std::io;

use thiserror::Error;

/// Error returned when a message payload is retrieved as the wrong type.
///
/// Asking for a payload with the wrong type is a programming error, so the
/// mismatch is always reported instead of being papered over with a default.
/// Use [`Message::payload_is`](crate::Message::payload_is) to check first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
  /// The message carries no payload at all (the empty sentinel, a prototype
  /// or a payload-less message such as a timer tick).
  #[error("message carries no payload")]
  Missing,
  /// The stored payload is of a different type than the one requested.
  #[error("payload type mismatch: expected `{expected}`, found `{found}`")]
  TypeMismatch {
    /// The type the caller asked for.
    expected: &'static str,
    /// The type actually stored in the message.
    found: &'static str,
  },
}

/// Error returned by the deferred delivery scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
  /// The scheduler has been shut down and accepts no new work.
  #[error("scheduler has been shut down")]
  ShutDown,
  /// The reserved empty message can never be delivered.
  #[error("cannot schedule the reserved empty message")]
  EmptyMessage,
  /// The scheduler worker thread could not be spawned.
  #[error("failed to spawn scheduler thread")]
  Spawn(#[from] io::Error),
  /// The process-wide scheduler failed to start earlier.
  #[error("global scheduler is unavailable")]
  Unavailable,
}
