use crate::channel::Channel;
use crate::error::ScheduleError;
use crate::message::{Message, TIMER_FIRED};

use parking_lot::{Condvar, Mutex, MutexGuard};

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_THREAD_NAME: &str = "fibre-relay-timer";

enum Delivery {
  Message(Message),
  Tick,
}

/// One pending delivery. Holds the channel weakly so scheduling never keeps
/// a channel alive.
struct Entry {
  due: Instant,
  seq: u64,
  target: Weak<Channel>,
  delivery: Delivery,
}

impl Entry {
  fn fire(self) {
    let Some(channel) = self.target.upgrade() else {
      tracing::trace!(seq = self.seq, "timer target dropped before firing, skipping");
      return;
    };
    match self.delivery {
      Delivery::Message(message) => channel.emplace(message),
      Delivery::Tick => channel.emplace(Message::without_payload(TIMER_FIRED, epoch_millis())),
    }
  }
}

// BinaryHeap is a max-heap: reverse so the earliest due (then the earliest
// submitted) entry sits on top.
impl Ord for Entry {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

impl PartialOrd for Entry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Entry {
  fn eq(&self, other: &Self) -> bool {
    self.due == other.due && self.seq == other.seq
  }
}

impl Eq for Entry {}

struct Queue {
  entries: BinaryHeap<Entry>,
  next_seq: u64,
  shutdown: bool,
}

struct Shared {
  queue: Mutex<Queue>,
  cond: Condvar,
}

/// Milliseconds since the UNIX epoch, the key carried by timer ticks.
fn epoch_millis() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(saturating_millis)
    .unwrap_or(0)
}

fn saturating_millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configures and starts a [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerBuilder {
  thread_name: String,
}

impl Default for SchedulerBuilder {
  fn default() -> Self {
    Self {
      thread_name: DEFAULT_THREAD_NAME.to_string(),
    }
  }
}

impl SchedulerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the name of the worker thread.
  pub fn thread_name(mut self, name: impl Into<String>) -> Self {
    self.thread_name = name.into();
    self
  }

  /// Spawns the worker thread and returns the running scheduler.
  pub fn build(self) -> Result<Scheduler, ScheduleError> {
    let shared = Arc::new(Shared {
      queue: Mutex::new(Queue {
        entries: BinaryHeap::new(),
        next_seq: 0,
        shutdown: false,
      }),
      cond: Condvar::new(),
    });

    let worker_shared = shared.clone();
    let handle = thread::Builder::new()
      .name(self.thread_name.clone())
      .spawn(move || run(worker_shared))?;
    tracing::debug!(thread = %self.thread_name, "scheduler started");

    Ok(Scheduler {
      shared,
      worker: Mutex::new(Some(handle)),
      thread_name: self.thread_name,
    })
  }
}

/// Delivers messages to channels after a delay, on a dedicated thread.
///
/// Each scheduled message is pushed exactly once when its delay elapses,
/// unless the target channel has been dropped in the meantime, in which case
/// it is silently discarded. Deliveries happen in due order; equal due times
/// keep submission order.
pub struct Scheduler {
  shared: Arc<Shared>,
  worker: Mutex<Option<JoinHandle<()>>>,
  thread_name: String,
}

impl fmt::Debug for Scheduler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scheduler")
      .field("thread_name", &self.thread_name)
      .field("pending", &self.pending())
      .field("shut_down", &self.is_shut_down())
      .finish()
  }
}

impl Scheduler {
  /// Starts a scheduler with default settings.
  pub fn new() -> Result<Self, ScheduleError> {
    SchedulerBuilder::default().build()
  }

  pub fn builder() -> SchedulerBuilder {
    SchedulerBuilder::default()
  }

  /// Pushes `message` to `channel` once `delay` has elapsed.
  pub fn schedule(
    &self,
    channel: &Arc<Channel>,
    delay: Duration,
    message: Message,
  ) -> Result<(), ScheduleError> {
    if message.is_empty() {
      return Err(ScheduleError::EmptyMessage);
    }
    self.enqueue(Arc::downgrade(channel), delay, Delivery::Message(message))
  }

  /// Pushes a [`TIMER_FIRED`] message to `channel` once `delay` has elapsed.
  /// Its key is the fire time in milliseconds since the UNIX epoch.
  pub fn schedule_tick(&self, channel: &Arc<Channel>, delay: Duration) -> Result<(), ScheduleError> {
    self.enqueue(Arc::downgrade(channel), delay, Delivery::Tick)
  }

  fn enqueue(
    &self,
    target: Weak<Channel>,
    delay: Duration,
    delivery: Delivery,
  ) -> Result<(), ScheduleError> {
    let mut queue = self.shared.queue.lock();
    if queue.shutdown {
      return Err(ScheduleError::ShutDown);
    }
    let Some(due) = Instant::now().checked_add(delay) else {
      // Beyond what an Instant can represent: it would never fire.
      tracing::trace!(?delay, "delay out of range, dropping delivery");
      return Ok(());
    };
    let seq = queue.next_seq;
    queue.next_seq += 1;
    queue.entries.push(Entry {
      due,
      seq,
      target,
      delivery,
    });
    drop(queue);
    self.shared.cond.notify_one();
    Ok(())
  }

  /// Number of deliveries still waiting for their delay to elapse.
  pub fn pending(&self) -> usize {
    self.shared.queue.lock().entries.len()
  }

  pub fn is_shut_down(&self) -> bool {
    self.shared.queue.lock().shutdown
  }

  /// Stops the worker thread. Pending deliveries are discarded and later
  /// calls to `schedule` fail with [`ScheduleError::ShutDown`].
  pub fn shutdown(&self) {
    {
      let mut queue = self.shared.queue.lock();
      if queue.shutdown {
        return;
      }
      queue.shutdown = true;
      queue.entries.clear();
    }
    self.shared.cond.notify_all();

    if let Some(handle) = self.worker.lock().take() {
      // An observer running on the worker itself may shut us down.
      if handle.thread().id() != thread::current().id() && handle.join().is_err() {
        tracing::error!(thread = %self.thread_name, "scheduler worker panicked");
      }
    }
    tracing::debug!(thread = %self.thread_name, "scheduler stopped");
  }
}

impl Drop for Scheduler {
  fn drop(&mut self) {
    self.shutdown();
  }
}

fn run(shared: Arc<Shared>) {
  let mut queue = shared.queue.lock();
  loop {
    if queue.shutdown {
      break;
    }
    match queue.entries.peek().map(|e| e.due) {
      None => shared.cond.wait(&mut queue),
      Some(due) if due > Instant::now() => {
        shared.cond.wait_until(&mut queue, due);
      }
      Some(_) => {
        if let Some(entry) = queue.entries.pop() {
          MutexGuard::unlocked(&mut queue, || deliver(entry));
        }
      }
    }
  }
}

/// Fires `entry`, containing a panic raised by an observer of the target
/// channel so the worker keeps serving every other channel.
fn deliver(entry: Entry) {
  let seq = entry.seq;
  if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| entry.fire())) {
    tracing::error!(
      seq,
      panic = panic_message(payload.as_ref()),
      "observer panicked during timed delivery"
    );
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
  if let Some(message) = panic.downcast_ref::<&'static str>() {
    *message
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.as_str()
  } else {
    "<non-string panic>"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

  const SETTLE: Duration = Duration::from_millis(150);

  #[test]
  fn delivers_after_delay() {
    let scheduler = Scheduler::new().unwrap();
    let ch = Channel::create();
    let start = Instant::now();
    scheduler
      .schedule(&ch, Duration::from_millis(30), Message::new(7, 1, "late"))
      .unwrap();
    assert!(ch.pop().is_empty());

    while ch.is_empty() {
      assert!(start.elapsed() < Duration::from_secs(5), "delivery never happened");
      thread::sleep(Duration::from_millis(2));
    }
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(*ch.pop().payload_ref::<&str>().unwrap(), "late");
    assert_eq!(scheduler.pending(), 0);
  }

  #[test]
  fn delivers_in_due_order() {
    let scheduler = Scheduler::new().unwrap();
    let ch = Channel::create();
    scheduler
      .schedule(&ch, Duration::from_millis(60), Message::without_payload(1, 3))
      .unwrap();
    scheduler
      .schedule(&ch, Duration::from_millis(20), Message::without_payload(1, 1))
      .unwrap();
    scheduler
      .schedule(&ch, Duration::from_millis(40), Message::without_payload(1, 2))
      .unwrap();

    thread::sleep(SETTLE);
    let keys: Vec<u64> = (0..3).map(|_| ch.pop().key()).collect();
    assert_eq!(keys, vec![1, 2, 3]);
  }

  #[test]
  fn dropped_channel_is_skipped() {
    struct DropCounter(Arc<AtomicUsize>);
    impl Drop for DropCounter {
      fn drop(&mut self) {
        self.0.fetch_add(1, AtomicOrdering::SeqCst);
      }
    }

    let scheduler = Scheduler::new().unwrap();
    let drops = Arc::new(AtomicUsize::new(0));
    let ch = Channel::create();
    let weak = Arc::downgrade(&ch);
    scheduler
      .schedule(&ch, Duration::from_millis(20), Message::new(1, 1, DropCounter(drops.clone())))
      .unwrap();
    drop(ch);
    assert!(weak.upgrade().is_none());

    thread::sleep(SETTLE);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(drops.load(AtomicOrdering::SeqCst), 1);
  }

  #[test]
  fn tick_carries_fire_time() {
    let scheduler = Scheduler::builder().thread_name("tick-test").build().unwrap();
    let ch = Channel::create();
    let before = epoch_millis();
    scheduler.schedule_tick(&ch, Duration::from_millis(10)).unwrap();
    thread::sleep(SETTLE);

    let tick = ch.pop();
    assert_eq!(tick.kind(), TIMER_FIRED);
    assert!(tick.key() >= before);
    assert!(tick.payload().is_none());
  }

  #[test]
  fn panicking_observer_does_not_stop_the_worker() {
    let scheduler = Scheduler::new().unwrap();
    let bad = Channel::create();
    let good = Channel::create();
    bad.observe(Arc::new(|_: &Message| -> bool { panic!("observer failure") }));

    scheduler
      .schedule(&bad, Duration::ZERO, Message::without_payload(1, 1))
      .unwrap();
    scheduler
      .schedule(&good, Duration::from_millis(10), Message::without_payload(2, 2))
      .unwrap();

    let start = Instant::now();
    while good.is_empty() {
      assert!(start.elapsed() < Duration::from_secs(5), "delivery stopped after a panic");
      thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(good.pop().key(), 2);
    assert_eq!(scheduler.pending(), 0);
    // The panicking push still enqueued its message.
    assert_eq!(bad.len(), 1);
  }

  #[test]
  fn panic_message_reads_string_payloads() {
    let static_str: Box<dyn Any + Send> = Box::new("boom");
    let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
    let other: Box<dyn Any + Send> = Box::new(7u8);
    assert_eq!(panic_message(static_str.as_ref()), "boom");
    assert_eq!(panic_message(owned.as_ref()), "bang");
    assert_eq!(panic_message(other.as_ref()), "<non-string panic>");
  }

  #[test]
  fn millis_saturate_instead_of_wrapping() {
    assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
    assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
  }

  #[test]
  fn empty_message_is_rejected() {
    let scheduler = Scheduler::new().unwrap();
    let ch = Channel::create();
    assert!(matches!(
      scheduler.schedule(&ch, Duration::ZERO, Message::empty()),
      Err(ScheduleError::EmptyMessage)
    ));
  }

  #[test]
  fn shutdown_discards_and_rejects() {
    let scheduler = Scheduler::new().unwrap();
    let ch = Channel::create();
    scheduler
      .schedule(&ch, Duration::from_secs(60), Message::without_payload(1, 1))
      .unwrap();
    assert_eq!(scheduler.pending(), 1);

    scheduler.shutdown();
    assert!(scheduler.is_shut_down());
    assert_eq!(scheduler.pending(), 0);
    assert!(matches!(
      scheduler.schedule_tick(&ch, Duration::ZERO),
      Err(ScheduleError::ShutDown)
    ));
    scheduler.shutdown();
  }
}
