//! Read side of the event queue.
//!
//! A consumer either blocks for exactly one event with
//! [`EventSource::read_blocking`], asks [`EventSource::is_ready`] without
//! blocking, or borrows [`EventSource::receiver`] to wait on it together with
//! other channels in one `select!`.

use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError, select};

use crate::commands::EventCode;

/// Result of a blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Exactly one event, removed from the queue
    Event(EventCode),
    /// The interrupt channel fired before an event arrived
    Interrupted,
    /// Every producer has gone away and the queue is drained
    Closed,
}

/// Consumer handle over the event queue.
pub struct EventSource {
    rx: Receiver<EventCode>,
}

impl EventSource {
    pub(crate) fn new(rx: Receiver<EventCode>) -> Self {
        Self { rx }
    }

    /// Block until one event is available or `interrupt` fires.
    ///
    /// An interrupt never consumes a queued event: the select only removes
    /// from the operation that completed, so the next event is still there
    /// for the following read.
    pub fn read_blocking(&self, interrupt: &Receiver<()>) -> ReadOutcome {
        select! {
            recv(interrupt) -> _ => ReadOutcome::Interrupted,
            recv(self.rx) -> msg => match msg {
                Ok(code) => ReadOutcome::Event(code),
                Err(_) => ReadOutcome::Closed,
            },
        }
    }

    /// Like [`read_blocking`](Self::read_blocking) with an upper bound.
    /// Returns `None` when the timeout elapses first.
    pub fn read_timeout(&self, interrupt: &Receiver<()>, timeout: Duration) -> Option<ReadOutcome> {
        select! {
            recv(interrupt) -> _ => Some(ReadOutcome::Interrupted),
            recv(self.rx) -> msg => Some(match msg {
                Ok(code) => ReadOutcome::Event(code),
                Err(_) => ReadOutcome::Closed,
            }),
            default(timeout) => None,
        }
    }

    /// Non-blocking read.
    pub fn try_read(&self) -> Option<ReadOutcome> {
        match self.rx.try_recv() {
            Ok(code) => Some(ReadOutcome::Event(code)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ReadOutcome::Closed),
        }
    }

    /// Whether a read would return immediately with an event
    pub fn is_ready(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Number of events waiting
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// The raw receiver, for multiplexed waits
    pub fn receiver(&self) -> &Receiver<EventCode> {
        &self.rx
    }
}
