//! Producer that reads event bytes from the input character device.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};

use super::{ProducerHandle, poll_timeout};
use crate::commands::EventCode;
use crate::error::InputError;
use crate::event_queue::EventProducer;

/// Producer for the byte-oriented event device (`/dev/music_input`).
///
/// Each successful read yields one event byte. The reader waits for readiness
/// with a bounded poll so it can notice the stop flag between events.
pub struct DeviceReader {
    path: PathBuf,
    file: File,
    poll_interval: Duration,
}

impl DeviceReader {
    /// Open the device read-only. Failure here is fatal for the daemon.
    pub fn open(path: &Path, poll_interval: Duration) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|source| InputError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Opened event device {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            poll_interval,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the reader onto its own thread
    pub fn spawn(self, producer: EventProducer) -> Result<ProducerHandle, InputError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("event-device".to_string())
            .spawn(move || {
                if let Err(e) = self.run(&producer, &thread_stop) {
                    log::error!("Event device reader stopped: {}", e);
                }
            })
            .map_err(InputError::Spawn)?;
        Ok(ProducerHandle::new("event-device", stop, thread))
    }

    /// Read until stopped, end of input, or an unrecoverable error
    pub fn run(mut self, producer: &EventProducer, stop: &AtomicBool) -> Result<(), InputError> {
        let mut byte = [0u8; 1];
        while !stop.load(Ordering::Relaxed) {
            if !self.wait_readable()? {
                continue;
            }
            match self.file.read(&mut byte) {
                Ok(0) => {
                    log::warn!("{}: end of input", self.path.display());
                    return Ok(());
                }
                Ok(_) => match EventCode::from_byte(byte[0]) {
                    Some(code) => {
                        log::debug!("device event {}", code);
                        producer.push(code);
                    }
                    None => log::debug!("ignoring unknown event byte {:#04x}", byte[0]),
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(InputError::Io {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn wait_readable(&self) -> Result<bool, InputError> {
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, poll_timeout(self.poll_interval)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(fds[0].revents().is_some_and(|r| {
                r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            })),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(InputError::Poll(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_queue::EventQueue;
    use std::io::Write;

    #[test]
    fn test_open_missing_device_fails() {
        let err = DeviceReader::open(Path::new("/nonexistent/music_input"), Duration::from_millis(10));
        assert!(matches!(err, Err(InputError::Open { .. })));
    }

    #[test]
    fn test_reader_decodes_bytes_in_order() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"PN\nXRUDMC").expect("write");
        file.flush().expect("flush");

        let queue = EventQueue::new(32);
        let reader = DeviceReader::open(file.path(), Duration::from_millis(10)).expect("open");
        let stop = AtomicBool::new(false);
        reader.run(&queue.producer(), &stop).expect("run");

        let mut codes = Vec::new();
        while let Some(code) = queue.try_pop() {
            codes.push(code);
        }
        assert_eq!(
            codes,
            vec![
                EventCode::PlayPause,
                EventCode::Next,
                EventCode::Prev,
                EventCode::VolumeUp,
                EventCode::VolumeDown,
                EventCode::MuteToggle,
                EventCode::ModeToggle,
            ]
        );
    }

    #[test]
    fn test_spawned_reader_feeds_queue() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"C").expect("write");
        file.flush().expect("flush");

        let queue = EventQueue::new(4);
        let reader = DeviceReader::open(file.path(), Duration::from_millis(10)).expect("open");
        let handle = reader.spawn(queue.producer()).expect("spawn");
        assert_eq!(queue.pop_blocking(), Some(EventCode::ModeToggle));
        handle.stop();
    }
}
