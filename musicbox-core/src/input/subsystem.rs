//! Edge handling: turns debounced line transitions into queued event codes.

use std::time::Instant;

use super::channel::{ChannelRole, GpioLine, InputChannel, Level};
use crate::commands::EventCode;
use crate::event_queue::EventProducer;

/// Reads the instantaneous level of a line, used to resolve encoder direction
pub trait LevelSampler {
    fn sample(&mut self, line: GpioLine) -> Option<Level>;
}

/// What happened to one raw transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Accepted and pushed to the queue
    Queued(EventCode),
    /// Accepted, but the queue was full
    Dropped(EventCode),
    /// Rejected by the channel's debounce window
    Debounced,
    /// Not an edge this channel reacts to
    Ignored,
}

/// Owns every input channel and the producer side of the event queue.
///
/// `on_edge` is the transition handler: it never blocks, never sleeps and has
/// no error path, so it is safe to call from an edge-notification context.
pub struct InputSubsystem {
    channels: Vec<InputChannel>,
    producer: EventProducer,
}

impl InputSubsystem {
    pub fn new(channels: Vec<InputChannel>, producer: EventProducer) -> Self {
        Self { channels, producer }
    }

    pub fn channels(&self) -> &[InputChannel] {
        &self.channels
    }

    /// Index of the channel bound to `line`
    pub fn find(&self, line: GpioLine) -> Option<usize> {
        self.channels.iter().position(|c| c.line == line)
    }

    fn encoder_data_line(&self) -> Option<GpioLine> {
        self.channels
            .iter()
            .find(|c| c.role == ChannelRole::EncoderData)
            .map(|c| c.line)
    }

    /// Handle one raw transition of channel `index` to `level` at `now`
    pub fn on_edge(
        &mut self,
        index: usize,
        level: Level,
        now: Instant,
        sampler: &mut dyn LevelSampler,
    ) -> EdgeOutcome {
        let data_line = self.encoder_data_line();
        let Some(channel) = self.channels.get_mut(index) else {
            return EdgeOutcome::Ignored;
        };

        let code = match channel.role {
            ChannelRole::Button(code) => {
                if level != channel.polarity.active_level() {
                    return EdgeOutcome::Ignored;
                }
                code
            }
            ChannelRole::EncoderClock => {
                if level != Level::Low {
                    return EdgeOutcome::Ignored;
                }
                // Direction is the data level at the moment the clock falls
                match data_line.and_then(|line| sampler.sample(line)) {
                    Some(Level::High) => EventCode::VolumeUp,
                    Some(Level::Low) => EventCode::VolumeDown,
                    None => {
                        log::trace!("{}: data line unreadable, edge ignored", channel.name);
                        return EdgeOutcome::Ignored;
                    }
                }
            }
            ChannelRole::EncoderData => return EdgeOutcome::Ignored,
        };

        if !channel.debouncer.accept(now) {
            log::trace!("{}: bounce suppressed", channel.name);
            return EdgeOutcome::Debounced;
        }

        if self.producer.push(code) {
            EdgeOutcome::Queued(code)
        } else {
            EdgeOutcome::Dropped(code)
        }
    }
}
