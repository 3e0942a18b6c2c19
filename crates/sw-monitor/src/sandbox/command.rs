//! Command lines for the local sandbox executable

use std::process::Stdio;

use tokio::process::Command;

/// Builds invocations of the sandbox executable (`wsl` by default)
#[derive(Debug, Clone)]
pub struct SandboxCommand {
    program: String,
    distribution: Option<String>,
}

impl SandboxCommand {
    /// `distribution` empty means the sandbox's default
    pub fn new(program: impl Into<String>, distribution: &str) -> Self {
        Self {
            program: program.into(),
            distribution: (!distribution.is_empty()).then(|| distribution.to_string()),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Availability probe: `<program> --status`
    pub fn status(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--status")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// `<program> [-d <distribution>] -- bash -c <script>`
    pub fn bash(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.bash_args(script))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    pub(crate) fn bash_args(&self, script: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(6);
        if let Some(distribution) = &self.distribution {
            args.push("-d".to_string());
            args.push(distribution.clone());
        }
        args.extend(["--", "bash", "-c", script].map(String::from));
        args
    }
}

/// Decode sandbox tool output, which may be UTF-16LE on some hosts
pub(crate) fn decode_output(bytes: &[u8]) -> String {
    let looks_utf16 = bytes.len() >= 2 && bytes.iter().skip(1).step_by(2).all(|b| *b == 0);
    if looks_utf16 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_args_default_distribution() {
        let cmd = SandboxCommand::new("wsl", "");
        assert_eq!(
            cmd.bash_args("\"$HOME/.sesswatch/monitor.sh\""),
            vec!["--", "bash", "-c", "\"$HOME/.sesswatch/monitor.sh\""]
        );
    }

    #[test]
    fn test_bash_args_named_distribution() {
        let cmd = SandboxCommand::new("wsl", "Ubuntu-22.04");
        assert_eq!(
            cmd.bash_args("true"),
            vec!["-d", "Ubuntu-22.04", "--", "bash", "-c", "true"]
        );
    }

    #[test]
    fn test_decode_output() {
        assert_eq!(decode_output(b"Default Distribution: Ubuntu"), "Default Distribution: Ubuntu");

        let utf16: Vec<u8> = "OK".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_output(&utf16), "OK");
    }
}
