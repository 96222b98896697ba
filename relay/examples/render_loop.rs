//! A worker thread feeds results back to a main loop that also reacts to
//! timer ticks, without blocking on either.

use fibre_relay::timer::Scheduler;
use fibre_relay::{pick, Channel, ChannelWait, Message, Significance, TIMER_FIRED};
use std::thread;
use std::time::Duration;

const RESULT: u32 = 1;
const FINISHED: u32 = 2;

fn main() {
  let results = Channel::create();
  let ticks = Channel::create();
  let scheduler = Scheduler::new().expect("failed to start scheduler");

  let worker = {
    let results = results.clone();
    thread::spawn(move || {
      for frame in 0..5u64 {
        thread::sleep(Duration::from_millis(30));
        results.push(RESULT, frame, format!("frame {} rendered", frame));
      }
      results.push(FINISHED, 0, ());
    })
  };

  let finished = ChannelWait::new(results.clone());
  finished.set_wait(Message::without_payload(FINISHED, 0), Significance::TYPE);
  scheduler.schedule_tick(&ticks, Duration::from_millis(50)).unwrap();

  loop {
    match pick(&[&*results, &*ticks]) {
      (m, Some(_)) if m.kind() == RESULT => {
        println!("main loop got: {}", m.payload_ref::<String>().unwrap());
      }
      (m, Some(_)) if m.kind() == TIMER_FIRED => {
        println!("tick at {} ms since epoch", m.key());
        scheduler.schedule_tick(&ticks, Duration::from_millis(50)).unwrap();
      }
      (m, Some(_)) if m.kind() == FINISHED => break,
      _ => finished.wait(Some(Duration::from_millis(10))),
    }
  }

  worker.join().unwrap();
  println!("worker finished, waiter done: {}", finished.done());
}
