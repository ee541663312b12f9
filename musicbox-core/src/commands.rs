use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::catalog::SourceMode;

/// A discrete user action produced by an input channel or the event device
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    /// Start, pause or resume playback
    PlayPause,
    /// Skip to the next track in the active catalog
    Next,
    /// Go back to the previous track in the active catalog
    Prev,
    /// Raise the output volume by one step
    VolumeUp,
    /// Lower the output volume by one step
    VolumeDown,
    /// Mute or unmute the output
    MuteToggle,
    /// Switch between the local and cloud catalogs
    ModeToggle,
}

impl EventCode {
    /// Decode one byte read from the event device
    pub fn from_byte(byte: u8) -> Option<EventCode> {
        match byte {
            b'P' => Some(EventCode::PlayPause),
            b'N' => Some(EventCode::Next),
            b'R' => Some(EventCode::Prev),
            b'U' => Some(EventCode::VolumeUp),
            b'D' => Some(EventCode::VolumeDown),
            b'M' => Some(EventCode::MuteToggle),
            b'C' => Some(EventCode::ModeToggle),
            _ => None,
        }
    }

    /// The byte the event device uses for this code
    pub fn as_byte(self) -> u8 {
        match self {
            EventCode::PlayPause => b'P',
            EventCode::Next => b'N',
            EventCode::Prev => b'R',
            EventCode::VolumeUp => b'U',
            EventCode::VolumeDown => b'D',
            EventCode::MuteToggle => b'M',
            EventCode::ModeToggle => b'C',
        }
    }
}

/// Everything the playback session can be asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Relative command shared by buttons and the remote
    Event(EventCode),
    /// Jump straight to a track, forcing the given catalog
    Select { mode: SourceMode, index: usize },
}

impl From<EventCode> for Command {
    fn from(code: EventCode) -> Self {
        Command::Event(code)
    }
}
