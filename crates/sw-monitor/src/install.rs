//! Install sequence shared by the SSH and sandbox installers
//!
//! Both installers only know how to run one shell command on the target,
//! optionally feeding it standard input. The dependency probe and the
//! ordered install steps are built on that primitive.

use async_trait::async_trait;

use sw_core::error::{InstallError, InstallStep};

use crate::scripts::{AgentScripts, RemoteLayout};

/// An external tool the agent needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredTool {
    /// Command looked up on `PATH`
    pub command: &'static str,
    /// Package that provides it on Debian-like systems
    pub package: &'static str,
}

pub const REQUIRED_TOOLS: &[RequiredTool] = &[
    RequiredTool {
        command: "inotifywait",
        package: "inotify-tools",
    },
    RequiredTool {
        command: "jq",
        package: "jq",
    },
];

/// Output of one command run on the target
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<u32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short failure description for error messages
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if stderr.is_empty() {
            format!("exit code {}", code)
        } else {
            format!("exit code {}: {}", code, stderr)
        }
    }
}

/// Runs a single shell command on the target
#[async_trait]
pub trait RemoteExec: Send {
    async fn exec(&mut self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, String>;
}

/// Shell snippet printing the name of every missing tool, one per line
pub fn probe_command() -> String {
    let names: Vec<&str> = REQUIRED_TOOLS.iter().map(|t| t.command).collect();
    format!(
        "for t in {}; do command -v \"$t\" >/dev/null 2>&1 || echo \"$t\"; done",
        names.join(" ")
    )
}

/// Describe missing tools, optionally with an apt install hint
pub fn missing_tools_message(missing: &[RequiredTool], with_hint: bool) -> String {
    let names: Vec<&str> = missing.iter().map(|t| t.command).collect();
    let mut message = format!("Missing required tools: {}", names.join(", "));
    if with_hint {
        let packages: Vec<&str> = missing.iter().map(|t| t.package).collect();
        message.push_str(&format!(
            ". Install them with: sudo apt install {}",
            packages.join(" ")
        ));
    }
    message
}

/// Probe the target for [`REQUIRED_TOOLS`]
pub async fn check_dependencies<E: RemoteExec + ?Sized>(exec: &mut E, with_hint: bool) -> (bool, String) {
    let output = match exec.exec(&probe_command(), None).await {
        Ok(output) => output,
        Err(e) => return (false, format!("Failed to check dependencies: {}", e)),
    };
    if !output.success() {
        return (
            false,
            format!("Failed to check dependencies: {}", output.failure_detail()),
        );
    }

    let reported: Vec<&str> = output.stdout.lines().map(str::trim).collect();
    let missing: Vec<RequiredTool> = REQUIRED_TOOLS
        .iter()
        .filter(|tool| reported.contains(&tool.command))
        .copied()
        .collect();

    if missing.is_empty() {
        (true, String::new())
    } else {
        (false, missing_tools_message(&missing, with_hint))
    }
}

/// Run the install steps in order, stopping at the first failure.
///
/// Every step is idempotent, so a failed install can simply be re-run.
pub async fn run_install<E: RemoteExec + ?Sized>(
    exec: &mut E,
    layout: &RemoteLayout,
    scripts: &AgentScripts,
) -> Result<(), InstallError> {
    tracing::info!("Installing monitor agent");

    step(exec, InstallStep::CreateDirectories, &layout.mkdir_command(), None).await?;

    let hook_path = layout.hook_path();
    step(
        exec,
        InstallStep::WriteScripts,
        &RemoteLayout::write_command(&hook_path),
        Some(scripts.hook.as_bytes()),
    )
    .await?;
    let monitor_path = layout.monitor_path();
    step(
        exec,
        InstallStep::WriteScripts,
        &RemoteLayout::write_command(&monitor_path),
        Some(scripts.monitor.as_bytes()),
    )
    .await?;

    step(exec, InstallStep::SetPermissions, &layout.chmod_command(), None).await?;

    step(
        exec,
        InstallStep::ConfigureHooks,
        &layout.configure_command(),
        Some(scripts.configure.as_bytes()),
    )
    .await?;

    tracing::info!("Monitor agent installed at {}", monitor_path);
    Ok(())
}

async fn step<E: RemoteExec + ?Sized>(
    exec: &mut E,
    step: InstallStep,
    command: &str,
    stdin: Option<&[u8]>,
) -> Result<(), InstallError> {
    tracing::debug!("Install step '{}': {}", step, command);
    let output = exec
        .exec(command, stdin)
        .await
        .map_err(|e| InstallError::step(step, e))?;
    if output.success() {
        Ok(())
    } else {
        Err(InstallError::step(step, output.failure_detail()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records commands and answers from a script of canned outputs
    struct ScriptedExec {
        seen: Vec<(String, Option<Vec<u8>>)>,
        fail_on: Option<&'static str>,
        stdout: String,
    }

    impl ScriptedExec {
        fn new() -> Self {
            Self {
                seen: Vec::new(),
                fail_on: None,
                stdout: String::new(),
            }
        }
    }

    #[async_trait]
    impl RemoteExec for ScriptedExec {
        async fn exec(&mut self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, String> {
            self.seen
                .push((command.to_string(), stdin.map(|s| s.to_vec())));
            if self.fail_on.map_or(false, |f| command.starts_with(f)) {
                return Ok(CommandOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "Operation not permitted\n".to_string(),
                });
            }
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_install_runs_steps_in_order() {
        let mut exec = ScriptedExec::new();
        let layout = RemoteLayout::new(".sesswatch");
        let scripts = AgentScripts::for_version("7.7.7");

        run_install(&mut exec, &layout, &scripts).await.unwrap();

        let commands: Vec<&str> = exec.seen.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(commands.len(), 5);
        assert!(commands[0].starts_with("mkdir -p"));
        assert!(commands[1].ends_with("hooks/status-hook.sh\""));
        assert!(commands[2].ends_with("monitor.sh\""));
        assert!(commands[3].starts_with("chmod +x"));
        assert!(commands[4].starts_with("bash -s --"));

        let monitor_body = String::from_utf8(exec.seen[2].1.clone().unwrap()).unwrap();
        assert!(monitor_body.contains("VERSION=\"7.7.7\""));
    }

    #[tokio::test]
    async fn test_install_stops_at_failed_step() {
        let mut exec = ScriptedExec::new();
        exec.fail_on = Some("chmod");
        let layout = RemoteLayout::new(".sesswatch");

        let err = run_install(&mut exec, &layout, &AgentScripts::current())
            .await
            .unwrap_err();

        match err {
            InstallError::StepFailed { step, message } => {
                assert_eq!(step, InstallStep::SetPermissions);
                assert!(message.contains("Operation not permitted"));
            }
            other => panic!("Unexpected error: {:?}", other),
        }
        // Hook registration never ran
        assert_eq!(exec.seen.len(), 4);
    }

    #[tokio::test]
    async fn test_dependencies_present() {
        let mut exec = ScriptedExec::new();
        let (ok, message) = check_dependencies(&mut exec, true).await;
        assert!(ok);
        assert!(message.is_empty());
        assert_eq!(exec.seen[0].0, probe_command());
    }

    #[tokio::test]
    async fn test_dependencies_lists_exactly_the_missing_tools() {
        let mut exec = ScriptedExec::new();
        exec.stdout = "jq\n".to_string();

        let (ok, message) = check_dependencies(&mut exec, true).await;
        assert!(!ok);
        assert_eq!(
            message,
            "Missing required tools: jq. Install them with: sudo apt install jq"
        );
    }

    #[test]
    fn test_missing_tools_message_without_hint() {
        assert_eq!(
            missing_tools_message(REQUIRED_TOOLS, false),
            "Missing required tools: inotifywait, jq"
        );
        assert_eq!(
            missing_tools_message(REQUIRED_TOOLS, true),
            "Missing required tools: inotifywait, jq. Install them with: sudo apt install inotify-tools jq"
        );
    }
}
