//! Agent installer for the local sandbox

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::error::{InstallError, TransportError};
use sw_core::traits::Installer;

use super::client::probe_sandbox;
use super::command::{decode_output, SandboxCommand};
use crate::install::{self, CommandOutput, RemoteExec};
use crate::scripts::{AgentScripts, RemoteLayout};

/// Installs the agent by running one sandbox process per command
pub struct SandboxInstaller {
    config: Arc<AppConfig>,
    command: SandboxCommand,
}

impl SandboxInstaller {
    pub fn new(target: Arc<ConnectionTarget>, config: Arc<AppConfig>) -> Self {
        let command = SandboxCommand::new(
            config.sandbox_command.clone(),
            target.sandbox.as_deref().unwrap_or_default(),
        );
        Self { config, command }
    }
}

#[async_trait]
impl RemoteExec for SandboxInstaller {
    async fn exec(&mut self, script: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, String> {
        let mut cmd = self.command.bash(script);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("cannot run '{}': {}", self.command.program(), e))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input)
                .await
                .map_err(|e| format!("failed to send input: {}", e))?;
            // Dropping the pipe delivers end of input
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to wait for command: {}", e))?;

        Ok(CommandOutput {
            exit_code: output.status.code().map(|c| c as u32),
            stdout: decode_output(&output.stdout),
            stderr: decode_output(&output.stderr),
        })
    }
}

#[async_trait]
impl Installer for SandboxInstaller {
    async fn connect(&mut self) -> Result<(), TransportError> {
        probe_sandbox(&self.command, self.config.connect_timeout).await
    }

    async fn close(&mut self) {}

    async fn check_dependencies(&mut self) -> (bool, String) {
        install::check_dependencies(self, true).await
    }

    async fn install(&mut self) -> Result<(), InstallError> {
        let layout = RemoteLayout::new(&self.config.install_dir);
        install::run_install(self, &layout, &AgentScripts::current()).await
    }
}
