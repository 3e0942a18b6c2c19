//! Local sandbox transport
//!
//! Reaches a locally virtualized Linux environment through a command-line
//! executor (`wsl` by default). No network authentication is involved.

mod client;
mod command;
mod installer;

pub use client::SandboxMonitorClient;
pub use command::SandboxCommand;
pub use installer::SandboxInstaller;
