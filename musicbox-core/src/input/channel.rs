//! Input channel description: line, polarity, role and debounce window.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::debounce::Debouncer;
use crate::commands::EventCode;

/// Opaque GPIO identity (the line number on the board's GPIO controller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GpioLine(pub u32);

/// Electrical level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value { Level::High } else { Level::Low }
    }
}

/// Which level means "pressed"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    pub fn active_level(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::Low,
            Polarity::ActiveHigh => Level::High,
        }
    }
}

/// What a channel contributes to the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Discrete button mapped to one event code
    Button(EventCode),
    /// Rotary encoder clock; its falling edge produces a volume step
    EncoderClock,
    /// Rotary encoder data; sampled by the clock handler, never fires itself
    EncoderData,
}

/// One physical control
#[derive(Debug, Clone)]
pub struct InputChannel {
    pub name: String,
    pub line: GpioLine,
    pub polarity: Polarity,
    pub role: ChannelRole,
    pub(crate) debouncer: Debouncer,
}

impl InputChannel {
    pub fn new(
        name: &str,
        line: GpioLine,
        polarity: Polarity,
        role: ChannelRole,
        debounce: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            line,
            polarity,
            role,
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Active-low button, the usual wiring with an internal pull-up
    pub fn button(name: &str, line: u32, code: EventCode, debounce: Duration) -> Self {
        Self::new(
            name,
            GpioLine(line),
            Polarity::ActiveLow,
            ChannelRole::Button(code),
            debounce,
        )
    }

    pub fn debounce_window(&self) -> Duration {
        self.debouncer.window()
    }
}
