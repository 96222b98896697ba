//! The message value carried by channels.
//!
//! A [`Message`] is a numeric kind, a numeric key and one type-erased payload.
//! Kind `0` ([`NULL_MESSAGE`]) is reserved for the empty sentinel that every
//! receive operation returns when nothing is available.

use crate::error::PayloadError;

use std::any::{self, Any, TypeId};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Reserved kind of the empty sentinel. Never produced by a real push.
pub const NULL_MESSAGE: u32 = 0;

/// Reserved kind pushed by [`schedule_tick`](crate::timer::Scheduler::schedule_tick).
/// The key carries the fire time in milliseconds since the UNIX epoch.
pub const TIMER_FIRED: u32 = u32::MAX;

/// A type-erased, cheaply clonable payload value.
#[derive(Clone)]
pub struct Payload {
  value: Arc<dyn Any + Send + Sync>,
  type_name: &'static str,
}

impl Payload {
  /// Wraps `value`.
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    Self {
      value: Arc::new(value),
      type_name: any::type_name::<T>(),
    }
  }

  /// The runtime type of the stored value.
  #[inline]
  pub fn type_id(&self) -> TypeId {
    (*self.value).type_id()
  }

  /// The name of the stored type, for diagnostics.
  #[inline]
  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  /// Returns `true` if the stored value is a `T`.
  #[inline]
  pub fn is<T: Any>(&self) -> bool {
    self.value.is::<T>()
  }

  /// Borrows the stored value as a `T`.
  pub fn downcast_ref<T: Any>(&self) -> Result<&T, PayloadError> {
    self.value.downcast_ref::<T>().ok_or(PayloadError::TypeMismatch {
      expected: any::type_name::<T>(),
      found: self.type_name,
    })
  }

  /// Converts into a shared handle to the stored `T`.
  pub fn downcast<T: Any + Send + Sync>(self) -> Result<Arc<T>, PayloadError> {
    let found = self.type_name;
    self.value.downcast::<T>().map_err(|_| PayloadError::TypeMismatch {
      expected: any::type_name::<T>(),
      found,
    })
  }
}

impl fmt::Debug for Payload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Payload")
      .field("type", &self.type_name)
      .finish_non_exhaustive()
  }
}

/// A single message: kind, key and an optional payload.
///
/// Once constructed a message is immutable. It is either the empty sentinel
/// (`kind == NULL_MESSAGE`, see [`Message::empty`]) or a fully populated value.
#[derive(Clone, Default)]
pub struct Message {
  kind: u32,
  key: u64,
  payload: Option<Payload>,
  origin: Option<&'static Location<'static>>,
}

impl Message {
  /// The empty sentinel returned when no message is available.
  #[inline]
  pub const fn empty() -> Self {
    Self {
      kind: NULL_MESSAGE,
      key: 0,
      payload: None,
      origin: None,
    }
  }

  /// Builds a message carrying `payload`. The caller's source location is
  /// recorded as the message origin.
  #[track_caller]
  pub fn new<T: Any + Send + Sync>(kind: u32, key: u64, payload: T) -> Self {
    Self {
      kind,
      key,
      payload: Some(Payload::new(payload)),
      origin: Some(Location::caller()),
    }
  }

  /// Builds a message without a payload. Mostly used for match prototypes.
  #[track_caller]
  pub fn without_payload(kind: u32, key: u64) -> Self {
    Self {
      kind,
      key,
      payload: None,
      origin: Some(Location::caller()),
    }
  }

  #[inline]
  pub fn kind(&self) -> u32 {
    self.kind
  }

  #[inline]
  pub fn key(&self) -> u64 {
    self.key
  }

  /// Returns `true` for the empty sentinel.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.kind == NULL_MESSAGE
  }

  /// Converts the sentinel into `None`, anything else into `Some(self)`.
  #[inline]
  pub fn into_option(self) -> Option<Self> {
    if self.is_empty() {
      None
    } else {
      Some(self)
    }
  }

  #[inline]
  pub fn payload(&self) -> Option<&Payload> {
    self.payload.as_ref()
  }

  /// The runtime type of the payload, `None` if there is no payload.
  #[inline]
  pub fn payload_type_id(&self) -> Option<TypeId> {
    self.payload.as_ref().map(Payload::type_id)
  }

  /// Returns `true` if the payload is present and is a `T`.
  #[inline]
  pub fn payload_is<T: Any>(&self) -> bool {
    self.payload.as_ref().is_some_and(Payload::is::<T>)
  }

  /// Borrows the payload as a `T`.
  pub fn payload_ref<T: Any>(&self) -> Result<&T, PayloadError> {
    self
      .payload
      .as_ref()
      .ok_or(PayloadError::Missing)?
      .downcast_ref::<T>()
  }

  /// Consumes the message, returning a shared handle to its `T` payload.
  pub fn into_payload<T: Any + Send + Sync>(self) -> Result<Arc<T>, PayloadError> {
    self.payload.ok_or(PayloadError::Missing)?.downcast::<T>()
  }

  /// Where the message was constructed. Diagnostic only.
  #[inline]
  pub fn origin(&self) -> Option<&'static Location<'static>> {
    self.origin
  }
}

impl fmt::Debug for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return f.write_str("Message::Empty");
    }
    let mut s = f.debug_struct("Message");
    s.field("kind", &self.kind)
      .field("key", &self.key)
      .field("payload", &self.payload.as_ref().map(Payload::type_name));
    if let Some(origin) = self.origin {
      s.field("origin", &format_args!("{}:{}", origin.file(), origin.line()));
    }
    s.finish()
  }
}
