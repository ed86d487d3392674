//! Admin command surface: slash-command parsing and execution.

pub mod command;
pub mod processor;

pub use command::{AdminCommand, BroadcastTarget};
pub use processor::{AdminProcessor, BroadcastSummary};
