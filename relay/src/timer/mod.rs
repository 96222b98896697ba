//! Deferred delivery: push a message to a channel after a delay.
//!
//! A [`Scheduler`] owns one worker thread. The free functions in this module
//! use a process-wide scheduler that is started on first use.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerBuilder};

use crate::channel::Channel;
use crate::error::ScheduleError;
use crate::message::Message;

use std::sync::Arc;
use std::time::Duration;

lazy_static::lazy_static! {
  static ref GLOBAL_SCHEDULER: Option<Scheduler> = {
    match SchedulerBuilder::new().thread_name("fibre-relay-global-timer").build() {
      Ok(scheduler) => Some(scheduler),
      Err(error) => {
        tracing::error!(%error, "could not start the global scheduler");
        None
      }
    }
  };
}

/// The process-wide scheduler.
pub fn global() -> Result<&'static Scheduler, ScheduleError> {
  GLOBAL_SCHEDULER.as_ref().ok_or(ScheduleError::Unavailable)
}

/// Schedules `message` on the global scheduler. See [`Scheduler::schedule`].
pub fn schedule(
  channel: &Arc<Channel>,
  delay: Duration,
  message: Message,
) -> Result<(), ScheduleError> {
  global()?.schedule(channel, delay, message)
}

/// Schedules a timer tick on the global scheduler. See
/// [`Scheduler::schedule_tick`].
pub fn schedule_tick(channel: &Arc<Channel>, delay: Duration) -> Result<(), ScheduleError> {
  global()?.schedule_tick(channel, delay)
}
