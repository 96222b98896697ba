mod common;
use common::*;

use fibre_relay::{pick, pick_matching, process, wait_pick, Channel, Message, Significance};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn pick_reports_source_channel() {
  let c1 = Channel::create();
  let c2 = Channel::create();
  c2.push(9, 1, "m");

  let channels = [c1.clone(), c2.clone()];
  let (m, source) = pick(&channels);
  assert_eq!(m.kind(), 9);
  let source = source.unwrap();
  assert!(Arc::ptr_eq(&channels[source], &c2));
}

#[test]
fn pick_matching_takes_first_matching_channel() {
  let channels = [Channel::create(), Channel::create(), Channel::create()];
  channels[0].push(1, 0, ());
  channels[1].push(2, 0, ());
  channels[2].push(2, 1, ());

  let proto = Message::without_payload(2, 0);
  let (m, source) = pick_matching(&channels, &proto, Significance::TYPE);
  assert_eq!((m.kind(), m.key()), (2, 0));
  assert_eq!(source, Some(1));

  let (m, source) = pick_matching(&channels, &proto, Significance::TYPE);
  assert_eq!((m.kind(), m.key()), (2, 1));
  assert_eq!(source, Some(2));

  let (m, source) = pick_matching(&channels, &proto, Significance::TYPE);
  assert!(m.is_empty());
  assert_eq!(source, None);
  assert_eq!(channels[0].len(), 1);
}

#[test]
fn wait_pick_across_producers() {
  let channels: Vec<Arc<Channel>> = (0..4).map(|_| Channel::create()).collect();
  let handles: Vec<_> = channels
    .iter()
    .enumerate()
    .map(|(i, ch)| {
      let ch = ch.clone();
      thread::spawn(move || {
        for j in 0..ITEMS_LOW as u64 {
          ch.push(1, ((i as u64) << 32) | j, ());
        }
      })
    })
    .collect();

  let mut seen = HashSet::new();
  while seen.len() < channels.len() * ITEMS_LOW {
    let (m, source) = wait_pick(&channels, &Message::empty(), Significance::NONE, Some(LONG_TIMEOUT));
    assert!(source.is_some(), "wait_pick timed out with {} seen", seen.len());
    assert!(seen.insert(m.key()));
  }

  for h in handles {
    h.join().unwrap();
  }
  for ch in &channels {
    assert_eq!(ch.observer_count(), 0);
  }
}

#[test]
fn process_counts_every_message_once() {
  let channels = [Channel::create(), Channel::create()];
  for i in 0..ITEMS_MEDIUM as u64 {
    channels[(i % 2) as usize].push(1, i, i);
  }
  let mut keys = Vec::new();
  let n = process(&channels, |m| keys.push(m.key()));
  assert_eq!(n, ITEMS_MEDIUM);
  keys.sort_unstable();
  assert_eq!(keys, (0..ITEMS_MEDIUM as u64).collect::<Vec<_>>());
  assert_eq!(process(&channels, |_| {}), 0);
}
