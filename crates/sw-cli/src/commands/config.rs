//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_info, print_warning};
use sw_core::config;

use super::load_app_config;

/// Config file to use: the `--config` argument or the default location
pub fn resolve_config_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path
        .cloned()
        .unwrap_or_else(config::default_config_path)
}

/// Show the effective configuration
pub fn config_show(path: &Path) -> Result<()> {
    if path.exists() {
        print_info(&format!("Configuration file: {}", path.display()));
    } else {
        print_warning(&format!(
            "No configuration file at {}, showing defaults",
            path.display()
        ));
    }
    println!();

    let config = load_app_config(path)?;
    let rendered =
        toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);

    Ok(())
}

/// Print the configuration file location
pub fn config_path(path: &Path) {
    println!("{}", path.display());
}
