//! sesswatch: Command-line front end
//!
//! Provides the `sesswatch` binary's commands, the console user interface
//! driven by the session orchestrator, and terminal output helpers.

pub mod commands;
pub mod console;
pub mod output;
