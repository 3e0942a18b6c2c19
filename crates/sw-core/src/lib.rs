//! sw-core: Core abstractions and configuration for sesswatch
//!
//! This crate provides the error taxonomy, configuration structures,
//! collaborator traits and session stream types shared by the monitor
//! transports, the orchestrator and the CLI.

pub mod config;
pub mod error;
pub mod streams;
pub mod time;
pub mod traits;
pub mod types;

pub use config::{AppConfig, ConfigStore, ConnectionTarget, TomlConfigStore};
pub use error::{ConfigError, InstallError, InstallStep, SessionError, StartError, TransportError};
pub use streams::{SessionStreams, StatusBatch};
pub use traits::{Installer, MonitorClient, TransportFactory};
pub use types::TransportKind;
