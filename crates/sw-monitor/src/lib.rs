//! sw-monitor: Monitor transports for sesswatch
//!
//! Runs the monitor agent over an SSH session or inside a local sandbox,
//! performs the version handshake, streams status batches, and installs or
//! upgrades the agent when it is missing or stale.

mod agent;
pub mod factory;
pub mod install;
pub mod sandbox;
pub mod scripts;
pub mod ssh;

pub use factory::DefaultTransportFactory;
pub use sandbox::{SandboxInstaller, SandboxMonitorClient};
pub use ssh::{SshInstaller, SshMonitorClient};
