//! Hosts command implementation

use anyhow::{Context, Result};

use crate::output::format_hosts;
use sw_core::config::{discover_hosts, AppConfig};

/// List the hosts found in the ssh config
pub fn hosts_command(config: &AppConfig) -> Result<()> {
    let hosts = discover_hosts(&config.ssh_config_path).with_context(|| {
        format!(
            "Failed to read ssh config {}",
            config.ssh_config_path.display()
        )
    })?;

    println!("{}", format_hosts(&hosts));
    Ok(())
}
