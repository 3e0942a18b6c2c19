//! Local sandbox transport tests
//!
//! A fake sandbox executable stands in for `wsl`: it answers `--status`,
//! strips the `-d <name> --` prefix and runs the requested bash command with
//! `HOME` pointed at a temp directory holding a scripted monitor agent.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::error::{StartError, TransportError};
use sw_core::traits::MonitorClient;
use sw_monitor::SandboxMonitorClient;
use sw_protocol::{SessionState, PROTOCOL_VERSION};

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        std::fs::create_dir_all(sandbox.home()).unwrap();
        write_executable(
            &sandbox.executable(),
            &format!(
                "#!/bin/sh\n\
                 if [ \"$1\" = \"--status\" ]; then exit 0; fi\n\
                 if [ \"$1\" = \"-d\" ]; then shift 2; fi\n\
                 if [ \"$1\" = \"--\" ]; then shift; fi\n\
                 export HOME='{}'\n\
                 shift\n\
                 exec /bin/bash \"$@\"\n",
                sandbox.home().display()
            ),
        );
        sandbox
    }

    fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    fn executable(&self) -> PathBuf {
        self.dir.path().join("fake-wsl")
    }

    /// Install a scripted monitor agent
    fn agent(&self, body: &str) {
        let dir = self.home().join(".sesswatch");
        std::fs::create_dir_all(&dir).unwrap();
        write_executable(&dir.join("monitor.sh"), &format!("#!/bin/sh\n{}", body));
    }

    fn client(&self, handshake_timeout: Duration) -> SandboxMonitorClient {
        let config = AppConfig {
            sandbox_command: self.executable().display().to_string(),
            handshake_timeout,
            ..AppConfig::default()
        };
        SandboxMonitorClient::new(
            Arc::new(ConnectionTarget::sandbox("Test")),
            Arc::new(config),
        )
    }
}

fn write_executable(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn version_line(version: &str) -> String {
    format!(
        "printf '%s\\n' '{{\"type\":\"version\",\"version\":\"{}\"}}'\n",
        version
    )
}

const STATUS_LINE: &str = "printf '%s\\n' '{\"type\":\"status\",\"data\":[{\"project\":\"/srv/api\",\"project_name\":\"api\",\"session_id\":\"s-1\",\"status\":\"working\",\"updated_at\":1700000000}]}'\n";

#[tokio::test]
async fn test_matching_version_streams_status() {
    let sandbox = Sandbox::new();
    sandbox.agent(&format!(
        "{}{}exec sleep 30\n",
        version_line(PROTOCOL_VERSION),
        STATUS_LINE
    ));

    let mut client = sandbox.client(Duration::from_secs(5));
    client.connect().await.unwrap();
    let mut streams = client.start().await.unwrap();

    let batch = tokio::time::timeout(Duration::from_secs(5), streams.status.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].project_display_name, "api");
    assert_eq!(batch[0].status, SessionState::Working);

    client.close().await;
    tokio::time::timeout(Duration::from_secs(5), streams.done.cancelled())
        .await
        .unwrap();
    // Second close is a no-op
    client.close().await;
}

#[tokio::test]
async fn test_other_version_is_a_mismatch() {
    let sandbox = Sandbox::new();
    sandbox.agent(&format!("{}exec sleep 30\n", version_line("0.9.0")));

    let mut client = sandbox.client(Duration::from_secs(5));
    client.connect().await.unwrap();
    let err = client.start().await.unwrap_err();
    client.close().await;

    assert!(err.is_version_problem());
    assert!(matches!(
        err,
        StartError::VersionMismatch { found: Some(ref v), .. } if v == "0.9.0"
    ));
}

#[tokio::test]
async fn test_silent_agent_times_out() {
    let sandbox = Sandbox::new();
    sandbox.agent("exec sleep 30\n");

    let mut client = sandbox.client(Duration::from_millis(300));
    client.connect().await.unwrap();
    let err = client.start().await.unwrap_err();
    client.close().await;

    assert!(matches!(err, StartError::HandshakeTimeout(_)));
    assert!(err.is_version_problem());
}

#[tokio::test]
async fn test_missing_agent_exits_early() {
    let sandbox = Sandbox::new();

    let mut client = sandbox.client(Duration::from_secs(5));
    client.connect().await.unwrap();
    let err = client.start().await.unwrap_err();
    client.close().await;

    match err {
        StartError::EarlyExit { code, detail } => {
            assert_eq!(code, Some(127));
            assert!(detail.contains("No such file or directory"), "{}", detail);
        }
        other => panic!("Expected early exit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_quietly() {
    let sandbox = Sandbox::new();
    sandbox.agent(&format!(
        "{}echo 'this is not json'\n{}exec sleep 30\n",
        version_line(PROTOCOL_VERSION),
        STATUS_LINE
    ));

    let mut client = sandbox.client(Duration::from_secs(5));
    client.connect().await.unwrap();
    let mut streams = client.start().await.unwrap();

    let batch = tokio::time::timeout(Duration::from_secs(5), streams.status.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch[0].session_id, "s-1");
    assert!(streams.errors.try_recv().is_err());
    assert!(!streams.done.is_cancelled());

    client.close().await;
}

#[tokio::test]
async fn test_error_frame_is_reported_to_the_caller() {
    let sandbox = Sandbox::new();
    sandbox.agent(&format!(
        "{}printf '%s\\n' '{{\"type\":\"error\",\"message\":\"inotify watch limit reached\"}}'\nexec sleep 30\n",
        version_line(PROTOCOL_VERSION)
    ));

    let mut client = sandbox.client(Duration::from_secs(5));
    client.connect().await.unwrap();
    let mut streams = client.start().await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), streams.errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(err.to_string(), "inotify watch limit reached");
    // Ending the session is the caller's decision
    assert!(!streams.done.is_cancelled());

    client.close().await;
}

#[tokio::test]
async fn test_agent_exit_signals_done() {
    let sandbox = Sandbox::new();
    sandbox.agent(&format!("{}exit 0\n", version_line(PROTOCOL_VERSION)));

    let mut client = sandbox.client(Duration::from_secs(5));
    client.connect().await.unwrap();
    let streams = client.start().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), streams.done.cancelled())
        .await
        .unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_start_requires_connect() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client(Duration::from_secs(5));
    assert!(matches!(
        client.start().await.unwrap_err(),
        StartError::NotConnected
    ));
}

#[tokio::test]
async fn test_missing_sandbox_executable() {
    let config = AppConfig {
        sandbox_command: "/nonexistent/sesswatch-fake-wsl".to_string(),
        ..AppConfig::default()
    };
    let mut client = SandboxMonitorClient::new(
        Arc::new(ConnectionTarget::sandbox("")),
        Arc::new(config),
    );

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::SandboxUnavailable(_)));
    // Close after a failed connect is safe
    client.close().await;
}

#[tokio::test]
async fn test_unhealthy_sandbox_status() {
    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("broken-wsl");
    write_executable(
        &exe,
        "#!/bin/sh\necho 'virtualization is disabled' >&2\nexit 1\n",
    );
    let config = AppConfig {
        sandbox_command: exe.display().to_string(),
        ..AppConfig::default()
    };
    let mut client = SandboxMonitorClient::new(
        Arc::new(ConnectionTarget::sandbox("")),
        Arc::new(config),
    );

    match client.connect().await.unwrap_err() {
        TransportError::SandboxUnavailable(message) => {
            assert!(message.contains("virtualization is disabled"), "{}", message);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}
