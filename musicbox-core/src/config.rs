//! Daemon configuration.
//!
//! Every field has a compiled default, so an empty file (or no file) yields a
//! working setup for the reference board.
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [input]
//! backend = "gpio"
//!
//! [[input.channels]]
//! name = "play"
//! line = 17
//! event = "play_pause"
//!
//! [remote]
//! port = 8080
//!
//! [[catalog.local]]
//! title = "Intro"
//! artist = "Someone"
//! location = "/usr/share/music/intro.mp3"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Catalogs, Track};
use crate::commands::EventCode;
use crate::error::ConfigError;
use crate::input::{ChannelRole, GpioLine, InputChannel, Polarity};
use crate::player::ProgramSpec;
use crate::session::{MAX_VOLUME, SessionSettings};

/// Used when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "/etc/musicbox/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub input: InputConfig,
    pub remote: RemoteConfig,
    pub player: PlayerConfig,
    pub mixer: MixerConfig,
    pub display: DisplayConfig,
    pub dispatch: DispatchConfig,
    pub catalog: CatalogConfig,
}

impl Config {
    /// Load from an explicit path, else the system path if present, else
    /// compiled defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let system = Path::new(DEFAULT_CONFIG_PATH);
                if system.exists() {
                    Self::load_from_file(system)?
                } else {
                    log::info!("no config at {}, using defaults", system.display());
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Clamp what can be clamped, reject what cannot work
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.mixer.initial_volume > MAX_VOLUME {
            log::warn!(
                "initial_volume {} out of range, clamping to {}",
                self.mixer.initial_volume,
                MAX_VOLUME
            );
            self.mixer.initial_volume = MAX_VOLUME;
        }

        if self.input.backend == InputBackend::Gpio {
            let roles: Vec<RoleKind> = self.input.channels.iter().map(|c| c.role).collect();
            if roles.is_empty() {
                return Err(ConfigError::Invalid(
                    "gpio backend needs at least one [[input.channels]] entry".to_string(),
                ));
            }
            let has_clock = roles.contains(&RoleKind::EncoderClock);
            let has_data = roles.contains(&RoleKind::EncoderData);
            if has_clock && !has_data {
                return Err(ConfigError::Invalid(
                    "encoder_clock channel configured without an encoder_data channel".to_string(),
                ));
            }
            // Surface missing button events here rather than at startup
            self.input_channels()?;
        }
        Ok(())
    }

    /// Render the effective configuration
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self)
            .unwrap_or_else(|e| format!("# configuration could not be rendered: {}\n", e))
    }

    pub fn input_channels(&self) -> Result<Vec<InputChannel>, ConfigError> {
        self.input.channels.iter().map(ChannelConfig::to_channel).collect()
    }

    pub fn catalogs(&self) -> Catalogs {
        Catalogs::new(
            Catalog::new(self.catalog.local.clone()),
            Catalog::new(self.catalog.cloud.clone()),
        )
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            grace: Duration::from_millis(self.player.grace_ms),
            auto_advance: self.player.auto_advance,
            min_run: Duration::from_millis(self.player.min_run_ms),
            initial_volume: self.mixer.initial_volume,
        }
    }

    pub fn decoder(&self) -> ProgramSpec {
        ProgramSpec {
            program: self.player.program.clone(),
            args: self.player.args.clone(),
        }
    }

    pub fn fetcher(&self) -> ProgramSpec {
        ProgramSpec {
            program: self.player.fetcher.clone(),
            args: self.player.fetcher_args.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "LogConfig::default_level")]
    pub level: String,
}

impl LogConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputBackend {
    /// Byte events from the character device
    #[default]
    Device,
    /// Raw edges from sysfs GPIO, debounced in user space
    Gpio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub backend: InputBackend,

    #[serde(default = "InputConfig::default_device")]
    pub device: PathBuf,

    /// Producer threads check their stop flag at this interval
    #[serde(default = "InputConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "InputConfig::default_gpio_root")]
    pub gpio_root: PathBuf,

    #[serde(default = "InputConfig::default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "InputConfig::default_channels")]
    pub channels: Vec<ChannelConfig>,
}

impl InputConfig {
    fn default_device() -> PathBuf {
        PathBuf::from("/dev/music_input")
    }

    fn default_poll_interval_ms() -> u64 {
        250
    }

    fn default_gpio_root() -> PathBuf {
        PathBuf::from("/sys/class/gpio")
    }

    fn default_queue_capacity() -> usize {
        crate::event_queue::DEFAULT_CAPACITY
    }

    fn default_channels() -> Vec<ChannelConfig> {
        vec![
            ChannelConfig::button("play", 17, EventCode::PlayPause),
            ChannelConfig::button("next", 27, EventCode::Next),
            ChannelConfig::button("prev", 22, EventCode::Prev),
            ChannelConfig::button("mode", 23, EventCode::ModeToggle),
            ChannelConfig::button("encoder_press", 13, EventCode::MuteToggle),
            ChannelConfig {
                name: "encoder_clock".to_string(),
                line: 5,
                active_low: true,
                debounce_ms: 40,
                role: RoleKind::EncoderClock,
                event: None,
            },
            ChannelConfig {
                name: "encoder_data".to_string(),
                line: 6,
                active_low: true,
                debounce_ms: 0,
                role: RoleKind::EncoderData,
                event: None,
            },
        ]
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: InputBackend::default(),
            device: Self::default_device(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            gpio_root: Self::default_gpio_root(),
            queue_capacity: Self::default_queue_capacity(),
            channels: Self::default_channels(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    #[default]
    Button,
    EncoderClock,
    EncoderData,
}

/// One `[[input.channels]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub line: u32,

    #[serde(default = "ChannelConfig::default_active_low")]
    pub active_low: bool,

    #[serde(default = "ChannelConfig::default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub role: RoleKind,

    /// Required for buttons, ignored otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventCode>,
}

impl ChannelConfig {
    fn default_active_low() -> bool {
        true
    }

    fn default_debounce_ms() -> u64 {
        250
    }

    fn button(name: &str, line: u32, event: EventCode) -> Self {
        Self {
            name: name.to_string(),
            line,
            active_low: Self::default_active_low(),
            debounce_ms: Self::default_debounce_ms(),
            role: RoleKind::Button,
            event: Some(event),
        }
    }

    pub fn to_channel(&self) -> Result<InputChannel, ConfigError> {
        let role = match self.role {
            RoleKind::Button => match self.event {
                Some(code) => ChannelRole::Button(code),
                None => {
                    return Err(ConfigError::Invalid(format!(
                        "button channel {} has no event",
                        self.name
                    )));
                }
            },
            RoleKind::EncoderClock => ChannelRole::EncoderClock,
            RoleKind::EncoderData => ChannelRole::EncoderData,
        };
        let polarity = if self.active_low {
            Polarity::ActiveLow
        } else {
            Polarity::ActiveHigh
        };
        Ok(InputChannel::new(
            &self.name,
            GpioLine(self.line),
            polarity,
            role,
            Duration::from_millis(self.debounce_ms),
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "RemoteConfig::default_enabled")]
    pub enabled: bool,

    #[serde(default = "RemoteConfig::default_bind")]
    pub bind: String,

    #[serde(default = "RemoteConfig::default_port")]
    pub port: u16,

    /// Upper bound on waiting for a client's request bytes
    #[serde(default = "RemoteConfig::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl RemoteConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_bind() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8888
    }

    fn default_read_timeout_ms() -> u64 {
        2000
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            bind: Self::default_bind(),
            port: Self::default_port(),
            read_timeout_ms: Self::default_read_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "PlayerConfig::default_program")]
    pub program: String,

    #[serde(default = "PlayerConfig::default_args")]
    pub args: Vec<String>,

    /// Streams cloud tracks to the player's stdin
    #[serde(default = "PlayerConfig::default_fetcher")]
    pub fetcher: String,

    #[serde(default = "PlayerConfig::default_fetcher_args")]
    pub fetcher_args: Vec<String>,

    #[serde(default = "PlayerConfig::default_grace_ms")]
    pub grace_ms: u64,

    #[serde(default = "PlayerConfig::default_auto_advance")]
    pub auto_advance: bool,

    /// Tracks ending sooner than this count towards giving up on auto-advance
    #[serde(default = "PlayerConfig::default_min_run_ms")]
    pub min_run_ms: u64,
}

impl PlayerConfig {
    fn default_program() -> String {
        "/usr/bin/mpg123".to_string()
    }

    fn default_args() -> Vec<String> {
        vec!["-q".to_string()]
    }

    fn default_fetcher() -> String {
        "/usr/bin/wget".to_string()
    }

    fn default_fetcher_args() -> Vec<String> {
        vec!["-qO-".to_string()]
    }

    fn default_grace_ms() -> u64 {
        1000
    }

    fn default_auto_advance() -> bool {
        true
    }

    fn default_min_run_ms() -> u64 {
        2000
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
            args: Self::default_args(),
            fetcher: Self::default_fetcher(),
            fetcher_args: Self::default_fetcher_args(),
            grace_ms: Self::default_grace_ms(),
            auto_advance: Self::default_auto_advance(),
            min_run_ms: Self::default_min_run_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    #[serde(default = "MixerConfig::default_program")]
    pub program: String,

    #[serde(default)]
    pub card: u32,

    #[serde(default = "MixerConfig::default_control")]
    pub control: String,

    #[serde(default = "MixerConfig::default_initial_volume")]
    pub initial_volume: u8,
}

impl MixerConfig {
    fn default_program() -> String {
        "amixer".to_string()
    }

    fn default_control() -> String {
        "PCM".to_string()
    }

    fn default_initial_volume() -> u8 {
        75
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
            card: 0,
            control: Self::default_control(),
            initial_volume: Self::default_initial_volume(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Text console for the status screen; stdout if it cannot be opened
    #[serde(default = "DisplayConfig::default_tty")]
    pub tty: PathBuf,
}

impl DisplayConfig {
    fn default_tty() -> PathBuf {
        PathBuf::from("/dev/tty1")
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tty: Self::default_tty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Minimum gap between accepted hardware events
    #[serde(default = "DispatchConfig::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Housekeeping interval of the dispatch loop
    #[serde(default = "DispatchConfig::default_tick_ms")]
    pub tick_ms: u64,
}

impl DispatchConfig {
    fn default_debounce_ms() -> u64 {
        200
    }

    fn default_tick_ms() -> u64 {
        200
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
            tick_ms: Self::default_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "CatalogConfig::default_local")]
    pub local: Vec<Track>,

    #[serde(default = "CatalogConfig::default_cloud")]
    pub cloud: Vec<Track>,
}

impl CatalogConfig {
    fn default_local() -> Vec<Track> {
        vec![
            Track::new("Run-it-Up", "Hanumankind", "/usr/share/music/RunitUp.mp3"),
            Track::new("Beat-it", "Michael Jackson", "/usr/share/music/BeatIt.mp3"),
            Track::new("Shape-of-You", "Ed Sheeran", "/usr/share/music/ShapeofYou.mp3"),
            Track::new("Gasolina", "Daddy Yankee", "/usr/share/music/Gasolina.mp3"),
            Track::new("Rap-God", "Eminem", "/usr/share/music/RapGod.mp3"),
        ]
    }

    fn default_cloud() -> Vec<Track> {
        const BASE: &str = "https://prudhvibelide.github.io/cloud-music-list/songs";
        [
            ("Starboy", "The Weeknd", "Starboy.mp3"),
            ("FEIN", "Travis Scott", "FEIN.mp3"),
            ("Heat Waves", "Glass Animals", "HeatWaves.mp3"),
            ("Sorry", "Justin Bieber", "Sorry.mp3"),
            ("STAY", "The Kid LAROI & Justin Bieber", "STAY.mp3"),
        ]
        .iter()
        .map(|(title, artist, file)| Track::new(title, artist, &format!("{BASE}/{file}")))
        .collect()
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            local: Self::default_local(),
            cloud: Self::default_cloud(),
        }
    }
}
