//! Fixed-capacity FIFO of [`EventCode`]s between the input producers and the
//! dispatch loop.
//!
//! Producers run in a context that must never block (an edge handler or a
//! device reader thread), so [`EventProducer::push`] is a non-blocking
//! `try_send`: when the queue is full the new event is dropped and the
//! survivors keep their order. The consumer side suspends in
//! [`EventQueue::pop_blocking`] or, through [`EventSource`], in a multiplexed
//! wait. The underlying bounded channel provides the mutual exclusion and the
//! wakeup guarantee: every successful push unblocks a waiting consumer.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::commands::EventCode;
use crate::event_source::EventSource;

/// Queue depth used by the event device.
pub const DEFAULT_CAPACITY: usize = 32;

/// Owner of the queue. Hands out producers and the single consumer source.
pub struct EventQueue {
    tx: Sender<EventCode>,
    rx: Receiver<EventCode>,
    capacity: usize,
}

impl EventQueue {
    /// Create an empty queue. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueue without blocking. Returns `false` if the queue is full.
    pub fn push(&self, code: EventCode) -> bool {
        try_push(&self.tx, code)
    }

    /// Block until an event is queued, then remove and return it.
    pub fn pop_blocking(&self) -> Option<EventCode> {
        self.rx.recv().ok()
    }

    /// Remove the oldest event if there is one.
    pub fn try_pop(&self) -> Option<EventCode> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// A cloneable handle for producer threads
    pub fn producer(&self) -> EventProducer {
        EventProducer {
            tx: self.tx.clone(),
        }
    }

    /// Give up the queue's own sender and return the consumer side.
    ///
    /// Once every [`EventProducer`] is dropped the source reports
    /// [`ReadOutcome::Closed`](crate::event_source::ReadOutcome::Closed).
    pub fn into_source(self) -> EventSource {
        EventSource::new(self.rx)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Producer half of the queue, safe to move into a reader thread.
#[derive(Clone)]
pub struct EventProducer {
    tx: Sender<EventCode>,
}

impl EventProducer {
    /// Enqueue without blocking. Returns `false` if the event was dropped.
    pub fn push(&self, code: EventCode) -> bool {
        try_push(&self.tx, code)
    }
}

fn try_push(tx: &Sender<EventCode>, code: EventCode) -> bool {
    match tx.try_send(code) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            // Consumer is behind; dropping keeps the producer non-blocking
            log::warn!("event queue full, dropped {}", code);
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            log::debug!("event queue closed, dropped {}", code);
            false
        }
    }
}

/// Drain everything currently queued, oldest first.
pub fn drain(rx: &Receiver<EventCode>) -> Vec<EventCode> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(code) => out.push(code),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use strum::IntoEnumIterator;

    #[test]
    fn test_push_then_pop_preserves_order() {
        let queue = EventQueue::new(8);
        let codes: Vec<EventCode> = EventCode::iter().collect();
        for code in &codes {
            assert!(queue.push(*code));
        }
        let popped: Vec<EventCode> = (0..codes.len())
            .filter_map(|_| queue.pop_blocking())
            .collect();
        assert_eq!(popped, codes);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let queue = EventQueue::new(2);
        assert!(queue.push(EventCode::Next));
        assert!(queue.push(EventCode::Prev));
        assert!(!queue.push(EventCode::VolumeUp));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop(), Some(EventCode::Next));
        assert_eq!(queue.try_pop(), Some(EventCode::Prev));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let queue = EventQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.push(EventCode::PlayPause));
    }

    #[test]
    fn test_push_from_other_thread_wakes_blocked_consumer() {
        let queue = EventQueue::default();
        let producer = queue.producer();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(producer.push(EventCode::MuteToggle));
        });
        assert_eq!(queue.pop_blocking(), Some(EventCode::MuteToggle));
        handle.join().expect("producer thread panicked");
    }

    #[test]
    fn test_drain_returns_oldest_first() {
        let queue = EventQueue::new(4);
        queue.push(EventCode::Next);
        queue.push(EventCode::ModeToggle);
        let source = queue.into_source();
        assert_eq!(
            drain(source.receiver()),
            vec![EventCode::Next, EventCode::ModeToggle]
        );
    }
}
