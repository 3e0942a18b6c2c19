//! SSH transport

mod client;
mod connector;
mod installer;
mod known_hosts;

pub use client::SshMonitorClient;
pub use installer::SshInstaller;
pub use known_hosts::{HostTrust, TrustError, TrustStore};
