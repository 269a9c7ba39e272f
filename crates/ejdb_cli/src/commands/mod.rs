//! CLI command implementations.

pub mod constants;
pub mod find;
pub mod inspect;
pub mod save;

/// Result type shared by the commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;
