//! Input side of the pipeline: physical channels, debouncing, and the
//! producer threads that feed the event queue.
//!
//! | Backend    | Producer            | Source                          |
//! |------------|---------------------|---------------------------------|
//! | `device`   | [`DeviceReader`]    | event bytes from a char device  |
//! | `gpio`     | [`SysfsGpio`]       | raw edges from sysfs GPIO lines |
//!
//! Both run on their own thread and only ever `try_send` into the queue, so a
//! slow consumer costs dropped events, never a stalled producer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use nix::poll::PollTimeout;

pub mod channel;
pub mod debounce;
pub mod device;
pub mod subsystem;
pub mod sysfs;

pub use channel::{ChannelRole, GpioLine, InputChannel, Level, Polarity};
pub use debounce::Debouncer;
pub use device::DeviceReader;
pub use subsystem::{EdgeOutcome, InputSubsystem, LevelSampler};
pub use sysfs::SysfsGpio;

/// A running producer thread and its stop flag
pub struct ProducerHandle {
    name: &'static str,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    pub(crate) fn new(name: &'static str, stop: Arc<AtomicBool>, thread: JoinHandle<()>) -> Self {
        Self {
            name,
            stop,
            thread: Some(thread),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Raise the stop flag and wait for the thread. It notices the flag at its
    /// next poll timeout.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("{} thread panicked", self.name);
            }
        }
    }
}

/// Poll timeouts are milliseconds in a `u16`; longer intervals saturate
pub(crate) fn poll_timeout(interval: Duration) -> PollTimeout {
    let ms = u16::try_from(interval.as_millis()).unwrap_or(u16::MAX);
    PollTimeout::from(ms)
}
