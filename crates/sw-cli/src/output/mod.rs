//! Output formatting utilities for the CLI
//!
//! Tables for session statuses and discovered hosts, plus colored status
//! messages.

use std::time::Duration;

use tabled::{settings::Style, Table, Tabled};

use sw_core::config::SshHost;
use sw_core::time::is_stale;
use sw_protocol::SessionStatus;

/// Format a status batch as an ASCII table.
///
/// Sessions not updated within `stale_after` of `now_secs` are marked stale.
pub fn format_statuses(
    statuses: &[SessionStatus],
    now_secs: i64,
    stale_after: Option<Duration>,
) -> String {
    if statuses.is_empty() {
        return "No active sessions".to_string();
    }

    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "PROJECT")]
        project: String,
        #[tabled(rename = "SESSION")]
        session: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "UPDATED")]
        updated: String,
    }

    let rows: Vec<StatusRow> = statuses
        .iter()
        .map(|s| {
            let stale = stale_after
                .map(|max| is_stale(s.updated_at_epoch_secs, now_secs, max))
                .unwrap_or(false);
            let age = s.age_secs(now_secs);

            StatusRow {
                project: s.project_display_name.clone(),
                session: truncate(&s.session_id, 12),
                status: if stale {
                    format!("{} (stale)", s.status)
                } else {
                    s.status.to_string()
                },
                updated: format!("{} ago", format_age(age)),
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format discovered ssh hosts as an ASCII table
pub fn format_hosts(hosts: &[SshHost]) -> String {
    if hosts.is_empty() {
        return "No hosts found in ssh config".to_string();
    }

    #[derive(Tabled)]
    struct HostRow {
        #[tabled(rename = "ALIAS")]
        alias: String,
        #[tabled(rename = "HOST")]
        host: String,
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "USER")]
        user: String,
    }

    let rows: Vec<HostRow> = hosts
        .iter()
        .map(|h| HostRow {
            alias: h.alias.clone(),
            host: h.host_name.clone(),
            port: h.port,
            user: h.user.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format an age in seconds in human-readable form
fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
