//! Trace utilities

/// Trace category for command spawning and completion.
pub const COMMANDS: &str = "commands";
/// Trace category for output collection.
pub const COLLECTOR: &str = "collector";
/// Trace category for task decisions.
pub const TASKS: &str = "tasks";
