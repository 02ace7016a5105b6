//! High-level commands called by the CLI frontend.

pub mod enable;
pub mod status;

pub use enable::EnableCommand;
pub use status::{ServiceStatusEntry, StatusCommand, StatusReport};
