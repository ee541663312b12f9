pub mod catalog;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod event_queue;
pub mod event_source;
pub mod input;
pub mod mixer;
pub mod player;
pub mod remote;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod mocks;

pub use catalog::{Catalog, Catalogs, PlaybackTarget, SourceMode, Track};
pub use commands::{Command, EventCode};
pub use config::Config;
pub use event_queue::{EventProducer, EventQueue};
pub use event_source::{EventSource, ReadOutcome};
pub use session::{Notice, PlaybackSession, RunState, SessionSnapshot};
