//! Recording doubles for the player and mixer seams.
//!
//! Clones share state, so a test can keep one handle while the session owns
//! another.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::catalog::PlaybackTarget;
use crate::error::PlayerError;
use crate::mixer::Mixer;
use crate::player::{PlayerBackend, PlayerProcess};

#[derive(Debug, Default)]
struct PlayerLog {
    next_pid: u32,
    spawned: Vec<(u32, PlaybackTarget)>,
    live: Vec<u32>,
    paused: Vec<u32>,
    terminated: Vec<u32>,
    max_live: usize,
    fail_spawn: bool,
    fail_signals: bool,
}

fn lock(state: &Mutex<PlayerLog>) -> MutexGuard<'_, PlayerLog> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fake player backend that hands out [`MockProcess`]es with fake pids
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<PlayerLog>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every spawn so far, oldest first
    pub fn spawned(&self) -> Vec<(u32, PlaybackTarget)> {
        lock(&self.state).spawned.clone()
    }

    /// Pids not yet terminated or exited
    pub fn live(&self) -> Vec<u32> {
        lock(&self.state).live.clone()
    }

    pub fn paused(&self) -> Vec<u32> {
        lock(&self.state).paused.clone()
    }

    pub fn terminated(&self) -> Vec<u32> {
        lock(&self.state).terminated.clone()
    }

    /// Highest number of simultaneously live processes ever observed
    pub fn max_live(&self) -> usize {
        lock(&self.state).max_live
    }

    /// Make subsequent spawns fail as if the binary were missing
    pub fn fail_spawn(&self, fail: bool) {
        lock(&self.state).fail_spawn = fail;
    }

    /// Make pause/resume fail as if the pid were gone
    pub fn fail_signals(&self, fail: bool) {
        lock(&self.state).fail_signals = fail;
    }

    /// Simulate the process exiting on its own (end of track)
    pub fn exit(&self, pid: u32) {
        let mut log = lock(&self.state);
        log.live.retain(|p| *p != pid);
        log.paused.retain(|p| *p != pid);
    }
}

impl PlayerBackend for MockBackend {
    type Process = MockProcess;

    fn spawn(&mut self, target: &PlaybackTarget) -> Result<MockProcess, PlayerError> {
        let mut log = lock(&self.state);
        if log.fail_spawn {
            return Err(PlayerError::Spawn {
                program: "mock-player".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        log.next_pid += 1;
        let pid = 1000 + log.next_pid;
        log.spawned.push((pid, target.clone()));
        log.live.push(pid);
        log.max_live = log.max_live.max(log.live.len());
        Ok(MockProcess {
            pid,
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockProcess {
    pid: u32,
    state: Arc<Mutex<PlayerLog>>,
}

impl MockProcess {
    fn signal(&self, stop: bool) -> Result<(), PlayerError> {
        let mut log = lock(&self.state);
        if log.fail_signals || !log.live.contains(&self.pid) {
            return Err(PlayerError::Signal {
                pid: self.pid,
                source: nix::errno::Errno::ESRCH,
            });
        }
        log.paused.retain(|p| *p != self.pid);
        if stop {
            log.paused.push(self.pid);
        }
        Ok(())
    }
}

impl PlayerProcess for MockProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.signal(true)
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        self.signal(false)
    }

    fn has_exited(&mut self) -> bool {
        !lock(&self.state).live.contains(&self.pid)
    }

    fn terminate(&mut self, _grace: Duration) -> Result<(), PlayerError> {
        let mut log = lock(&self.state);
        log.live.retain(|p| *p != self.pid);
        log.paused.retain(|p| *p != self.pid);
        log.terminated.push(self.pid);
        Ok(())
    }
}

/// Mixer that remembers every level it was set to
#[derive(Debug, Clone, Default)]
pub struct RecordingMixer {
    levels: Arc<Mutex<Vec<u8>>>,
}

impl RecordingMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<u8> {
        self.levels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<u8> {
        self.levels().last().copied()
    }
}

impl Mixer for RecordingMixer {
    fn set_level(&mut self, percent: u8) {
        self.levels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(percent);
    }
}
