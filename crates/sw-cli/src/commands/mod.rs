//! CLI command implementations

mod config;
mod hosts;
mod run;

pub use config::{config_path, config_show, resolve_config_path};
pub use hosts::hosts_command;
pub use run::{load_app_config, run_command};
