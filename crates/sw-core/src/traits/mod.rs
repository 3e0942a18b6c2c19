//! Core trait definitions

mod monitor;
mod installer;

pub use installer::Installer;
pub use monitor::{MonitorClient, TransportFactory};
