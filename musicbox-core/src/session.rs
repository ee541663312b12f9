//! Playback state machine.
//!
//! The session owns at most one player process. The run state is derived from
//! whether a process is held and whether it is suspended, so "handle present
//! iff Playing or Paused" holds by construction:
//!
//! ```text
//!            PLAY_PAUSE               PLAY_PAUSE
//!  Stopped ─────────────▶ Playing ◀──────────────▶ Paused
//!     ▲                     │  NEXT/PREV/MODE/select │
//!     └──── stop/exit ──────┴─── (terminate, reap, ──┘
//!                                 spawn the new track)
//! ```
//!
//! Every operation returns a [`Notice`] describing what happened, which the
//! daemon shows on the display.

use std::fmt;
use std::time::{Duration, Instant};

use crate::catalog::{Catalogs, SourceMode};
use crate::commands::{Command, EventCode};
use crate::mixer::Mixer;
use crate::player::{PlayerBackend, PlayerProcess};

/// Volume change per VOLUME_UP / VOLUME_DOWN
pub const VOLUME_STEP: u8 = 5;

pub const MAX_VOLUME: u8 = 100;

/// Observable run state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RunState {
    #[strum(serialize = "Stopped")]
    Stopped,
    #[strum(serialize = "Playing")]
    Playing,
    #[strum(serialize = "Paused")]
    Paused,
}

/// Outcome of one session operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Playing,
    Paused,
    Resumed,
    Stopped,
    VolumeChanged(u8),
    Muted,
    Unmuted,
    ModeChanged(SourceMode),
    TrackSelected { mode: SourceMode, index: usize },
    TrackFinished,
    NothingToPlay,
    SpawnFailed,
    /// Every track in the catalog exited right after starting
    AdvanceHalted,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Playing => write!(f, "Playing"),
            Notice::Paused => write!(f, "Paused"),
            Notice::Resumed => write!(f, "Resumed"),
            Notice::Stopped => write!(f, "Stopped"),
            Notice::VolumeChanged(v) => write!(f, "Volume changed to {}%", v),
            Notice::Muted => write!(f, "Muted"),
            Notice::Unmuted => write!(f, "Unmuted"),
            Notice::ModeChanged(mode) => write!(f, "Mode changed: {}", mode),
            Notice::TrackSelected { mode, index } => {
                write!(f, "Remote: playing {} track {}", mode, index + 1)
            }
            Notice::TrackFinished => write!(f, "Track finished"),
            Notice::NothingToPlay => write!(f, "Catalog is empty"),
            Notice::SpawnFailed => write!(f, "Player failed to start"),
            Notice::AdvanceHalted => write!(f, "No track would play, stopped"),
        }
    }
}

/// Tunables the session takes from configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// How long a terminated player gets before SIGKILL
    pub grace: Duration,
    /// Start the next track when the current one ends on its own
    pub auto_advance: bool,
    /// A track that ends sooner than this counts as a failed start
    pub min_run: Duration,
    pub initial_volume: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            auto_advance: true,
            min_run: Duration::from_secs(2),
            initial_volume: 75,
        }
    }
}

/// Point-in-time copy of the session for rendering and status replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: RunState,
    pub mode: SourceMode,
    pub index: usize,
    pub catalog_len: usize,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub volume: u8,
    pub muted: bool,
    pub pid: Option<u32>,
}

impl SessionSnapshot {
    /// What the mixer is actually set to
    pub fn effective_volume(&self) -> u8 {
        if self.muted { 0 } else { self.volume }
    }
}

struct ActivePlayer<P> {
    process: P,
    paused: bool,
    started: Instant,
}

pub struct PlaybackSession<B: PlayerBackend, M: Mixer> {
    backend: B,
    mixer: M,
    catalogs: Catalogs,
    settings: SessionSettings,
    player: Option<ActivePlayer<B::Process>>,
    mode: SourceMode,
    index: usize,
    volume: u8,
    muted: bool,
    /// Consecutive auto-advanced tracks that exited before `min_run`
    quick_exits: usize,
}

impl<B: PlayerBackend, M: Mixer> PlaybackSession<B, M> {
    /// Start `Stopped` at index 0 in local mode. The mixer is not touched
    /// until [`apply_volume`](Self::apply_volume) or a volume command.
    pub fn new(backend: B, mixer: M, catalogs: Catalogs, settings: SessionSettings) -> Self {
        Self {
            backend,
            mixer,
            catalogs,
            settings,
            player: None,
            mode: SourceMode::default(),
            index: 0,
            volume: settings.initial_volume.min(MAX_VOLUME),
            muted: false,
            quick_exits: 0,
        }
    }

    pub fn state(&self) -> RunState {
        match &self.player {
            None => RunState::Stopped,
            Some(active) if active.paused => RunState::Paused,
            Some(_) => RunState::Playing,
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn effective_volume(&self) -> u8 {
        if self.muted { 0 } else { self.volume }
    }

    pub fn pid(&self) -> Option<u32> {
        self.player.as_ref().map(|active| active.process.id())
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    /// Apply one command from a button, the event device or the remote
    pub fn apply(&mut self, command: Command) -> Notice {
        match command {
            Command::Event(code) => self.handle_event(code),
            Command::Select { mode, index } => self.select(mode, index),
        }
    }

    pub fn handle_event(&mut self, code: EventCode) -> Notice {
        match code {
            EventCode::PlayPause => self.play_pause(),
            EventCode::Next => self.next(),
            EventCode::Prev => self.prev(),
            EventCode::VolumeUp => self.volume_up(),
            EventCode::VolumeDown => self.volume_down(),
            EventCode::MuteToggle => self.toggle_mute(),
            EventCode::ModeToggle => self.toggle_mode(),
        }
    }

    pub fn play_pause(&mut self) -> Notice {
        let Some(active) = self.player.as_mut() else {
            return self.start();
        };

        // The player may have exited since the last housekeeping pass
        if active.process.has_exited() {
            log::warn!("player {} already exited, restarting", active.process.id());
            return self.restart();
        }

        if active.paused {
            match active.process.resume() {
                Ok(()) => {
                    active.paused = false;
                    log::info!("resumed player {}", active.process.id());
                    Notice::Resumed
                }
                Err(e) => {
                    log::warn!("resume failed: {}", e);
                    self.restart()
                }
            }
        } else {
            match active.process.pause() {
                Ok(()) => {
                    active.paused = true;
                    log::info!("paused player {}", active.process.id());
                    Notice::Paused
                }
                Err(e) => {
                    log::warn!("pause failed: {}", e);
                    self.restart()
                }
            }
        }
    }

    pub fn next(&mut self) -> Notice {
        self.stop_player();
        self.index = self.catalog().next_index(self.index);
        self.start()
    }

    pub fn prev(&mut self) -> Notice {
        self.stop_player();
        self.index = self.catalog().prev_index(self.index);
        self.start()
    }

    /// Switch catalogs, re-clamp the index and restart on the new source
    pub fn toggle_mode(&mut self) -> Notice {
        self.stop_player();
        self.mode = self.mode.toggled();
        self.index = self.catalog().clamp_index(self.index);
        log::info!("switched to {}", self.mode);
        match self.start() {
            Notice::Playing => Notice::ModeChanged(self.mode),
            other => other,
        }
    }

    /// Jump to a track, forcing `mode`. Out-of-range indices select track 0.
    pub fn select(&mut self, mode: SourceMode, index: usize) -> Notice {
        self.stop_player();
        self.mode = mode;
        self.index = if index < self.catalog().len() { index } else { 0 };
        match self.start() {
            Notice::Playing => Notice::TrackSelected {
                mode: self.mode,
                index: self.index,
            },
            other => other,
        }
    }

    pub fn volume_up(&mut self) -> Notice {
        self.set_volume(self.volume.saturating_add(VOLUME_STEP))
    }

    pub fn volume_down(&mut self) -> Notice {
        self.set_volume(self.volume.saturating_sub(VOLUME_STEP))
    }

    /// Store a new volume, clamped to 0..=100. While muted the mixer stays at 0.
    pub fn set_volume(&mut self, percent: u8) -> Notice {
        self.volume = percent.min(MAX_VOLUME);
        self.apply_volume();
        Notice::VolumeChanged(self.volume)
    }

    pub fn toggle_mute(&mut self) -> Notice {
        self.muted = !self.muted;
        self.apply_volume();
        if self.muted {
            log::info!("muted (volume {}% kept)", self.volume);
            Notice::Muted
        } else {
            log::info!("unmuted, volume {}%", self.volume);
            Notice::Unmuted
        }
    }

    /// Push the effective volume to the mixer
    pub fn apply_volume(&mut self) {
        let level = self.effective_volume();
        self.mixer.set_level(level);
    }

    /// Terminate and reap the player, if any
    pub fn stop(&mut self) -> Notice {
        self.stop_player();
        Notice::Stopped
    }

    pub fn shutdown(&mut self) {
        if self.player.is_some() {
            log::info!("stopping player for shutdown");
        }
        self.stop_player();
    }

    /// Housekeeping: notice a player that exited on its own. Returns `None`
    /// when nothing changed.
    ///
    /// Auto-advance gives up once a whole catalog pass has exited before
    /// `min_run`, leaving the session `Stopped`.
    pub fn poll_player(&mut self) -> Option<Notice> {
        let active = self.player.as_mut()?;
        if !active.process.has_exited() {
            return None;
        }
        let ran = active.started.elapsed();
        log::info!("player {} finished after {:?}", active.process.id(), ran);
        // Reaps whatever is left of the handle, such as a stream fetcher
        self.stop_player();

        if !self.settings.auto_advance {
            return Some(Notice::TrackFinished);
        }

        if ran < self.settings.min_run {
            self.quick_exits += 1;
        } else {
            self.quick_exits = 0;
        }
        if self.quick_exits >= self.catalog().len() {
            log::error!(
                "{} tracks in a row exited within {:?}, not advancing",
                self.quick_exits,
                self.settings.min_run
            );
            self.quick_exits = 0;
            return Some(Notice::AdvanceHalted);
        }

        self.index = self.catalog().next_index(self.index);
        Some(self.spawn_current())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let track = self.catalog().get(self.index);
        SessionSnapshot {
            state: self.state(),
            mode: self.mode,
            index: self.index,
            catalog_len: self.catalog().len(),
            title: track.map(|t| t.title.clone()),
            artist: track.map(|t| t.artist.clone()),
            volume: self.volume,
            muted: self.muted,
            pid: self.pid(),
        }
    }

    fn catalog(&self) -> &crate::catalog::Catalog {
        self.catalogs.for_mode(self.mode)
    }

    /// Start on behalf of a command, which clears the failed-start count
    fn start(&mut self) -> Notice {
        self.quick_exits = 0;
        self.spawn_current()
    }

    /// Spawn the current track. Only called with no player held.
    fn spawn_current(&mut self) -> Notice {
        debug_assert!(self.player.is_none());
        let Some(target) = self.catalogs.target(self.mode, self.index) else {
            log::warn!("{} catalog is empty, nothing to play", self.mode);
            return Notice::NothingToPlay;
        };
        match self.backend.spawn(&target) {
            Ok(process) => {
                log::info!(
                    "playing {} track {} (pid {})",
                    self.mode,
                    self.index,
                    process.id()
                );
                self.player = Some(ActivePlayer {
                    process,
                    paused: false,
                    started: Instant::now(),
                });
                Notice::Playing
            }
            Err(e) => {
                log::error!("{}", e);
                Notice::SpawnFailed
            }
        }
    }

    /// Drop stale state and issue a fresh start
    fn restart(&mut self) -> Notice {
        self.stop_player();
        self.start()
    }

    fn stop_player(&mut self) {
        if let Some(mut active) = self.player.take() {
            let pid = active.process.id();
            match active.process.terminate(self.settings.grace) {
                Ok(()) => log::info!("stopped player {}", pid),
                Err(e) => log::warn!("stopping player {}: {}", pid, e),
            }
        }
    }
}
