//! Console user interface
//!
//! [`ConsoleUi`] renders orchestrator updates to the terminal, and
//! [`read_commands`] turns lines typed on stdin into [`UiCommand`]s.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sw_core::config::{discover_hosts, ConnectionTarget, SshHost};
use sw_core::time::current_time_secs;
use sw_orchestrator::{ErrorKind, UiCommand, UiShell};
use sw_protocol::SessionStatus;

use crate::output::{
    format_hosts, format_statuses, print_error, print_info, print_success, print_warning,
};

const HELP: &str = "Commands: connect <host|sandbox[:distro]>, disconnect, hosts, status, quit";

/// Terminal implementation of the orchestrator's UI shell
pub struct ConsoleUi {
    stale_after: Option<Duration>,
    latest: Mutex<Vec<SessionStatus>>,
}

impl ConsoleUi {
    pub fn new(stale_after: Option<Duration>) -> Self {
        Self {
            stale_after,
            latest: Mutex::new(Vec::new()),
        }
    }

    /// Print the most recent snapshot again
    pub fn print_latest(&self) {
        let table = match self.latest.lock() {
            Ok(latest) => format_statuses(&latest, current_time_secs(), self.stale_after),
            Err(_) => return,
        };
        println!("{}", table);
    }
}

impl UiShell for ConsoleUi {
    fn show_connecting(&self, target: &ConnectionTarget) {
        print_info(&format!("Connecting to {}...", target.display_name()));
    }

    fn show_installing(&self, target: &ConnectionTarget, reinstall: bool) {
        let action = if reinstall { "Updating" } else { "Installing" };
        print_info(&format!(
            "{} monitor agent on {}...",
            action,
            target.display_name()
        ));
    }

    fn show_connected(&self, target: &ConnectionTarget) {
        print_success(&format!("Monitoring {}", target.display_name()));
    }

    fn show_disconnected(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            latest.clear();
        }
        print_warning("Disconnected");
    }

    fn show_error(&self, kind: ErrorKind, message: &str) {
        print_error(&format!("{}: {}", kind, message));
    }

    fn show_statuses(&self, statuses: &[SessionStatus]) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = statuses.to_vec();
        }
        println!(
            "{}",
            format_statuses(statuses, current_time_secs(), self.stale_after)
        );
    }

    fn show_server_selection(&self, hosts: &[SshHost]) {
        println!("{}", format_hosts(hosts));
        print_info("Select a server with: connect <alias>");
    }
}

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Send(UiCommand),
    Hosts,
    Status,
    Help,
    Empty,
    Unknown(String),
}

/// Parse one line typed by the user
pub fn parse_line(line: &str) -> ConsoleCommand {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return ConsoleCommand::Empty;
    };

    match (verb, words.next()) {
        ("connect", Some(spec)) => {
            ConsoleCommand::Send(UiCommand::ServerSelected(parse_target(spec)))
        }
        ("disconnect", None) => ConsoleCommand::Send(UiCommand::Disconnect),
        ("quit" | "exit", None) => ConsoleCommand::Send(UiCommand::Quit),
        ("hosts", None) => ConsoleCommand::Hosts,
        ("status", None) => ConsoleCommand::Status,
        ("help" | "?", None) => ConsoleCommand::Help,
        _ => ConsoleCommand::Unknown(line.trim().to_string()),
    }
}

/// Build a target from `sandbox`, `sandbox:<distro>` or `[user@]host[:port]`.
///
/// Remote hosts are usually ssh config aliases; the orchestrator fills in the
/// rest from the ssh config.
pub fn parse_target(spec: &str) -> ConnectionTarget {
    if spec == "sandbox" {
        return ConnectionTarget::sandbox("");
    }
    if let Some(distro) = spec.strip_prefix("sandbox:") {
        return ConnectionTarget::sandbox(distro);
    }

    let (user, rest) = match spec.split_once('@') {
        Some((user, rest)) => (user, rest),
        None => ("", spec),
    };
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (rest, None),
        },
        None => (rest, None),
    };

    let mut target = ConnectionTarget::remote(host, host);
    target.user = user.to_string();
    if let Some(port) = port {
        target.port = port;
    }
    target
}

/// Forward commands typed on `input` to the orchestrator.
///
/// End of input does not quit: the sender is held until `shutdown` fires so
/// the orchestrator keeps running when stdin is closed.
pub async fn read_commands<R>(
    input: R,
    commands: mpsc::Sender<UiCommand>,
    ui: std::sync::Arc<ConsoleUi>,
    ssh_config_path: PathBuf,
    shutdown: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read command input: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            ConsoleCommand::Send(command) => {
                let quitting = command == UiCommand::Quit;
                if commands.send(command).await.is_err() {
                    return;
                }
                if quitting {
                    return;
                }
            }
            ConsoleCommand::Hosts => match discover_hosts(&ssh_config_path) {
                Ok(hosts) => println!("{}", format_hosts(&hosts)),
                Err(e) => print_error(&format!("Failed to read ssh config: {}", e)),
            },
            ConsoleCommand::Status => ui.print_latest(),
            ConsoleCommand::Help => print_info(HELP),
            ConsoleCommand::Empty => {}
            ConsoleCommand::Unknown(text) => {
                print_warning(&format!("Unknown command: {}", text));
                print_info(HELP);
            }
        }
    }

    tracing::debug!("Command input closed");
    shutdown.cancelled().await;
}
