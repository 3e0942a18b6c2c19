//! Sandbox installer tests against a fake sandbox executable

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use sw_core::config::{AppConfig, ConnectionTarget};
use sw_core::traits::Installer;
use sw_monitor::SandboxInstaller;
use sw_protocol::PROTOCOL_VERSION;

fn write_executable(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Fake sandbox running bash with `HOME` at `home` and an optional `PATH`
fn fake_sandbox(dir: &Path, home: &Path, path: Option<&str>) -> String {
    let exe = dir.join("fake-wsl");
    let path_line = path
        .map(|p| format!("export PATH='{}'\n", p))
        .unwrap_or_default();
    write_executable(
        &exe,
        &format!(
            "#!/bin/sh\n\
             if [ \"$1\" = \"--status\" ]; then exit 0; fi\n\
             if [ \"$1\" = \"-d\" ]; then shift 2; fi\n\
             if [ \"$1\" = \"--\" ]; then shift; fi\n\
             export HOME='{}'\n\
             {}\
             shift\n\
             exec /bin/bash \"$@\"\n",
            home.display(),
            path_line
        ),
    );
    exe.display().to_string()
}

fn installer(sandbox_command: String) -> SandboxInstaller {
    let config = AppConfig {
        sandbox_command,
        ..AppConfig::default()
    };
    SandboxInstaller::new(
        Arc::new(ConnectionTarget::sandbox("Ubuntu")),
        Arc::new(config),
    )
}

fn jq_available() -> bool {
    std::process::Command::new("jq")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_missing_tools_are_named_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    std::fs::create_dir_all(&home).unwrap();
    let exe = fake_sandbox(dir.path(), &home, Some("/nonexistent"));

    let mut installer = installer(exe);
    installer.connect().await.unwrap();
    let (ok, message) = installer.check_dependencies().await;
    installer.close().await;

    assert!(!ok);
    assert_eq!(
        message,
        "Missing required tools: inotifywait, jq. Install them with: sudo apt install inotify-tools jq"
    );
}

#[tokio::test]
async fn test_install_writes_layout_and_registers_hooks() {
    if !jq_available() {
        eprintln!("jq not installed, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    std::fs::create_dir_all(home.join(".claude")).unwrap();
    std::fs::write(
        home.join(".claude/settings.json"),
        r#"{"theme":"dark","hooks":{"Stop":[{"hooks":[{"type":"command","command":"notify-send done"}]}]}}"#,
    )
    .unwrap();
    let exe = fake_sandbox(dir.path(), &home, None);

    let mut installer = installer(exe);
    installer.connect().await.unwrap();
    installer.install().await.unwrap();
    // Re-running is safe
    installer.install().await.unwrap();
    installer.close().await;

    let monitor = home.join(".sesswatch/monitor.sh");
    let hook = home.join(".sesswatch/hooks/status-hook.sh");
    for script in [&monitor, &hook] {
        let mode = std::fs::metadata(script).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "{} is not executable", script.display());
    }
    let body = std::fs::read_to_string(&monitor).unwrap();
    assert!(body.contains(&format!("VERSION=\"{}\"", PROTOCOL_VERSION)));

    let settings: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(home.join(".claude/settings.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(settings["theme"], "dark");

    let stop = settings["hooks"]["Stop"].as_array().unwrap();
    // Existing entry kept, ours added exactly once
    assert_eq!(stop.len(), 2);
    assert_eq!(stop[0]["hooks"][0]["command"], "notify-send done");
    let ours = stop[1]["hooks"][0]["command"].as_str().unwrap();
    assert!(ours.ends_with("status-hook.sh idle"));
    assert!(ours.starts_with(&home.display().to_string()));

    assert_eq!(settings["hooks"]["UserPromptSubmit"].as_array().unwrap().len(), 1);
    assert_eq!(settings["hooks"]["SessionEnd"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_install_reports_failing_step() {
    let dir = tempfile::tempdir().unwrap();
    // HOME points at a regular file, so mkdir fails
    let home = dir.path().join("home-file");
    std::fs::write(&home, "").unwrap();
    let exe = fake_sandbox(dir.path(), &home, None);

    let mut installer = installer(exe);
    let err = installer.install().await.unwrap_err();
    assert!(
        err.to_string().starts_with("Install step 'create directories' failed"),
        "{}",
        err
    );
}
