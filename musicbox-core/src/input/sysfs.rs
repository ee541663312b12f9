//! Producer that watches sysfs GPIO `value` files for edges.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};

use super::channel::{ChannelRole, GpioLine, Level};
use super::subsystem::{EdgeOutcome, InputSubsystem, LevelSampler};
use super::{ProducerHandle, poll_timeout};
use crate::error::InputError;

/// A watched line: its channel index and the open `value` file
struct WatchedLine {
    index: usize,
    path: PathBuf,
    file: File,
    /// Configured for falling edges only, so every wake is a fall
    falling_only: bool,
}

/// Samples the encoder data line by re-reading its `value` file
struct DataLine {
    line: GpioLine,
    file: File,
}

struct ValueSampler<'a>(Option<&'a mut DataLine>);

impl LevelSampler for ValueSampler<'_> {
    fn sample(&mut self, line: GpioLine) -> Option<Level> {
        let data = self.0.as_deref_mut()?;
        if data.line != line {
            return None;
        }
        read_level(&mut data.file).ok()
    }
}

/// Edge producer on top of the sysfs GPIO interface.
///
/// Every non-data channel gets edge detection configured and its `value`
/// file watched for `POLLPRI`. On wake the new level is read back and handed
/// to [`InputSubsystem::on_edge`], which debounces and enqueues.
pub struct SysfsGpio {
    subsystem: InputSubsystem,
    lines: Vec<WatchedLine>,
    data: Option<DataLine>,
    poll_interval: Duration,
}

impl SysfsGpio {
    pub fn open(
        root: &Path,
        subsystem: InputSubsystem,
        poll_interval: Duration,
    ) -> Result<Self, InputError> {
        let mut lines = Vec::new();
        let mut data = None;

        for (index, channel) in subsystem.channels().iter().enumerate() {
            let dir = root.join(format!("gpio{}", channel.line.0));
            let value_path = dir.join("value");
            let file = File::open(&value_path).map_err(|source| InputError::Open {
                path: value_path.clone(),
                source,
            })?;

            match channel.role {
                ChannelRole::EncoderData => {
                    data = Some(DataLine {
                        line: channel.line,
                        file,
                    });
                }
                ChannelRole::EncoderClock => {
                    configure_edge(&dir, "falling");
                    lines.push(WatchedLine {
                        index,
                        path: value_path,
                        file,
                        falling_only: true,
                    });
                }
                ChannelRole::Button(_) => {
                    configure_edge(&dir, "both");
                    lines.push(WatchedLine {
                        index,
                        path: value_path,
                        file,
                        falling_only: false,
                    });
                }
            }
            log::debug!("watching {} on gpio{}", channel.name, channel.line.0);
        }

        Ok(Self {
            subsystem,
            lines,
            data,
            poll_interval,
        })
    }

    /// Move the edge loop onto its own thread
    pub fn spawn(self) -> Result<ProducerHandle, InputError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("gpio-edges".to_string())
            .spawn(move || {
                if let Err(e) = self.run(&thread_stop) {
                    log::error!("GPIO edge reader stopped: {}", e);
                }
            })
            .map_err(InputError::Spawn)?;
        Ok(ProducerHandle::new("gpio-edges", stop, thread))
    }

    fn run(mut self, stop: &AtomicBool) -> Result<(), InputError> {
        // Reading once clears the notification left over from export
        for line in &mut self.lines {
            let _ = read_level(&mut line.file);
        }

        while !stop.load(Ordering::Relaxed) {
            let ready: Vec<usize> = {
                let mut fds: Vec<PollFd> = self
                    .lines
                    .iter()
                    .map(|l| PollFd::new(l.file.as_fd(), PollFlags::POLLPRI | PollFlags::POLLERR))
                    .collect();
                match poll(&mut fds, poll_timeout(self.poll_interval)) {
                    Ok(0) | Err(Errno::EINTR) => continue,
                    Ok(_) => fds
                        .iter()
                        .enumerate()
                        .filter(|(_, fd)| {
                            fd.revents()
                                .is_some_and(|r| r.intersects(PollFlags::POLLPRI | PollFlags::POLLERR))
                        })
                        .map(|(i, _)| i)
                        .collect(),
                    Err(e) => return Err(InputError::Poll(e)),
                }
            };

            self.handle_ready(&ready, Instant::now())?;
        }
        Ok(())
    }

    /// Read back the lines that woke (indices into the watched set) and feed
    /// each to the input subsystem
    fn handle_ready(&mut self, ready: &[usize], now: Instant) -> Result<(), InputError> {
        let Self {
            subsystem,
            lines,
            data,
            ..
        } = self;
        for &i in ready {
            let Some(line) = lines.get_mut(i) else {
                continue;
            };
            // The read also clears the pending notification
            let read = read_level(&mut line.file).map_err(|source| InputError::Io {
                path: line.path.clone(),
                source,
            })?;
            // A fast clock may already be back high by the time it is read
            let level = if line.falling_only { Level::Low } else { read };
            let mut sampler = ValueSampler(data.as_mut());
            if let EdgeOutcome::Dropped(code) = subsystem.on_edge(line.index, level, now, &mut sampler) {
                log::warn!("queue full, {} from {} lost", code, line.path.display());
            }
        }
        Ok(())
    }
}

/// Best effort: lines exported by the boot scripts may already be configured
fn configure_edge(dir: &Path, edge: &str) {
    if let Err(e) = fs::write(dir.join("edge"), edge) {
        log::warn!("could not set {} edge on {}: {}", edge, dir.display(), e);
    }
}

/// Read a sysfs `value` file from the start: `0` is low, anything else high
fn read_level(file: &mut File) -> std::io::Result<Level> {
    let mut buf = [0u8; 4];
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(&mut buf)?;
    match buf.get(..n).and_then(|b| b.first()) {
        Some(b'0') => Ok(Level::Low),
        Some(_) => Ok(Level::High),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty gpio value",
        )),
    }
}
