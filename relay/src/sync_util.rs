//! Small helpers shared by the blocking paths.

use std::time::{Duration, Instant};

/// Converts an optional timeout into an optional deadline.
///
/// `None` means wait forever. A timeout too large to represent as an
/// `Instant` is treated the same way.
#[inline]
pub(crate) fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
  timeout.and_then(|t| Instant::now().checked_add(t))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn infinite_and_overflowing_timeouts_have_no_deadline() {
    assert!(deadline_after(None).is_none());
    assert!(deadline_after(Some(Duration::MAX)).is_none());
  }

  #[test]
  fn finite_timeout_is_in_the_future() {
    let before = Instant::now();
    let deadline = deadline_after(Some(Duration::from_millis(50))).unwrap();
    assert!(deadline >= before + Duration::from_millis(50));
  }
}
