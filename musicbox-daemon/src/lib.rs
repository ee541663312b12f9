//! Shared pieces of the `musicboxd` daemon and its diagnostic tools.

pub mod dispatch;
pub mod listener;
pub mod logger;
