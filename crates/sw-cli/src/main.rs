//! sesswatch CLI
//!
//! Watches coding assistant session status on a remote host or local sandbox:
//! - `run` (default): connect, install the monitor agent if needed, and show
//!   status updates as they arrive
//! - `hosts`: list hosts from the ssh config
//! - `config`: inspect the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sesswatch::commands;
use sesswatch::output::print_error;

#[derive(Parser)]
#[command(name = "sesswatch")]
#[command(author, version, about = "Session status monitor for remote hosts and local sandboxes")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and monitor sessions (default)
    Run {
        /// Server to monitor instead of the configured one
        /// Examples: "devbox", "dev@10.0.0.5:2222", "sandbox:Ubuntu"
        #[arg(short, long)]
        server: Option<String>,
    },

    /// List hosts from the ssh config
    Hosts,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = commands::resolve_config_path(cli.config.as_ref());

    // `debug = true` in the config file raises the default level
    let config_debug = commands::load_app_config(&config_path)
        .map(|c| c.debug)
        .unwrap_or(false);

    let log_level = match (cli.quiet, cli.verbose, config_debug) {
        (true, _, _) => "error",
        (false, 0, false) => "warn",
        (false, 0, true) => "debug",
        (false, 1, _) => "info",
        (false, 2, _) => "debug",
        (false, _, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let command = cli.command.unwrap_or(Commands::Run { server: None });

    match command {
        Commands::Run { server } => {
            let code = match commands::run_command(&config_path, server.as_deref()).await {
                Ok(()) => 0,
                Err(e) => {
                    print_error(&format!("{:#}", e));
                    1
                }
            };
            // A pending stdin read cannot be cancelled and would hold the runtime open
            std::process::exit(code);
        }

        Commands::Hosts => {
            let config = commands::load_app_config(&config_path)?;
            commands::hosts_command(&config)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&config_path)?,
            ConfigAction::Path => commands::config_path(&config_path),
        },
    }

    Ok(())
}
