//! Property tests for the input side: per-channel debouncing and the bounded
//! FIFO between producers and the consumer.

use std::time::{Duration, Instant};

use musicbox_core::EventCode;
use musicbox_core::event_queue::EventQueue;
use musicbox_core::input::{Debouncer, EdgeOutcome, InputChannel, InputSubsystem, Level};
use musicbox_core::input::{GpioLine, LevelSampler};
use proptest::prelude::*;
use strum::IntoEnumIterator;

struct NoSampler;

impl LevelSampler for NoSampler {
    fn sample(&mut self, _line: GpioLine) -> Option<Level> {
        None
    }
}

fn any_code() -> impl Strategy<Value = EventCode> {
    let codes: Vec<EventCode> = EventCode::iter().collect();
    proptest::sample::select(codes)
}

proptest! {
    /// Accepted transitions on one channel are never closer than the window.
    #[test]
    fn debounce_accepts_are_separated_by_window(
        window_ms in 1u64..300,
        gaps in proptest::collection::vec(0u64..400, 1..64),
    ) {
        let window = Duration::from_millis(window_ms);
        let mut debouncer = Debouncer::new(window);
        let start = Instant::now();
        let mut t = start;
        let mut accepted: Vec<Instant> = Vec::new();
        for gap in gaps {
            t += Duration::from_millis(gap);
            if debouncer.accept(t) {
                accepted.push(t);
            }
        }
        prop_assert!(!accepted.is_empty());
        for pair in accepted.windows(2) {
            prop_assert!(pair[1].duration_since(pair[0]) >= window);
        }
    }

    /// The same rule holds end to end through the transition handler.
    #[test]
    fn button_edges_respect_channel_window(
        gaps in proptest::collection::vec(0u64..120, 1..64),
    ) {
        let window = Duration::from_millis(50);
        let queue = EventQueue::new(64);
        let mut subsystem = InputSubsystem::new(
            vec![InputChannel::button("play", 17, EventCode::PlayPause, window)],
            queue.producer(),
        );
        let mut t = Instant::now();
        let mut queued = Vec::new();
        for gap in gaps {
            t += Duration::from_millis(gap);
            if let EdgeOutcome::Queued(_) = subsystem.on_edge(0, Level::Low, t, &mut NoSampler) {
                queued.push(t);
            }
        }
        for pair in queued.windows(2) {
            prop_assert!(pair[1].duration_since(pair[0]) >= window);
        }
        prop_assert_eq!(queue.len(), queued.len());
    }

    /// Up to capacity, pops return pushes unmodified.
    #[test]
    fn queue_is_fifo_within_capacity(
        codes in proptest::collection::vec(any_code(), 0..=32),
    ) {
        let queue = EventQueue::new(32);
        for code in &codes {
            prop_assert!(queue.push(*code));
        }
        let popped: Vec<EventCode> = (0..codes.len()).filter_map(|_| queue.try_pop()).collect();
        prop_assert_eq!(popped, codes);
        prop_assert!(queue.is_empty());
    }

    /// Beyond capacity only the newest excess is dropped; survivors keep order.
    #[test]
    fn queue_overflow_drops_newest(
        capacity in 1usize..16,
        codes in proptest::collection::vec(any_code(), 0..48),
    ) {
        let queue = EventQueue::new(capacity);
        let accepted: Vec<bool> = codes.iter().map(|c| queue.push(*c)).collect();
        let kept = codes.len().min(capacity);
        prop_assert!(accepted.iter().take(kept).all(|ok| *ok));
        prop_assert!(accepted.iter().skip(kept).all(|ok| !*ok));

        let mut popped = Vec::new();
        while let Some(code) = queue.try_pop() {
            popped.push(code);
        }
        prop_assert_eq!(popped, codes[..kept].to_vec());
    }
}
