//! Agent scripts embedded at build time and the remote layout they live in
//!
//! Layout under the target's home directory:
//!
//! ```text
//! ~/<install_dir>/monitor.sh              monitor agent
//! ~/<install_dir>/hooks/status-hook.sh    hook handler
//! ~/<install_dir>/status/                 per-session state (written by the hook)
//! ```

use sw_protocol::PROTOCOL_VERSION;

/// Placeholder replaced with the protocol version
pub const VERSION_TOKEN: &str = "__VERSION__";

const MONITOR_TEMPLATE: &str = include_str!("../scripts/monitor.sh");
const HOOK_TEMPLATE: &str = include_str!("../scripts/status-hook.sh");
const CONFIGURE_TEMPLATE: &str = include_str!("../scripts/configure-hooks.sh");

/// Substitute the version token
pub fn render(template: &str, version: &str) -> String {
    template.replace(VERSION_TOKEN, version)
}

/// Rendered script contents
#[derive(Debug, Clone)]
pub struct AgentScripts {
    pub monitor: String,
    pub hook: String,
    pub configure: String,
}

impl AgentScripts {
    /// Scripts stamped with this build's protocol version
    pub fn current() -> Self {
        Self::for_version(PROTOCOL_VERSION)
    }

    pub fn for_version(version: &str) -> Self {
        Self {
            monitor: render(MONITOR_TEMPLATE, version),
            hook: render(HOOK_TEMPLATE, version),
            configure: render(CONFIGURE_TEMPLATE, version),
        }
    }
}

/// Shell-level paths and commands for the agent's install directory.
///
/// Paths are rooted at `$HOME` and left for the target's shell to expand.
#[derive(Debug, Clone)]
pub struct RemoteLayout {
    dir: String,
}

impl RemoteLayout {
    pub fn new(install_dir: &str) -> Self {
        Self {
            dir: format!("$HOME/{}", install_dir.trim_matches('/')),
        }
    }

    pub fn monitor_path(&self) -> String {
        format!("{}/monitor.sh", self.dir)
    }

    pub fn hook_path(&self) -> String {
        format!("{}/hooks/status-hook.sh", self.dir)
    }

    /// Command that runs the monitor agent in the foreground
    pub fn monitor_command(&self) -> String {
        quote(&self.monitor_path())
    }

    pub fn mkdir_command(&self) -> String {
        format!("mkdir -p {}", quote(&format!("{}/hooks", self.dir)))
    }

    /// Command that writes its standard input to `path`
    pub fn write_command(path: &str) -> String {
        format!("cat > {}", quote(path))
    }

    pub fn chmod_command(&self) -> String {
        format!(
            "chmod +x {} {}",
            quote(&self.hook_path()),
            quote(&self.monitor_path())
        )
    }

    /// Command that runs the configuration script supplied on standard input
    pub fn configure_command(&self) -> String {
        format!("bash -s -- {}", quote(&self.hook_path()))
    }
}

/// Double-quote for the shell, keeping `$HOME` expandable
fn quote(path: &str) -> String {
    format!("\"{}\"", path.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_carry_protocol_version() {
        let scripts = AgentScripts::current();
        for script in [&scripts.monitor, &scripts.hook, &scripts.configure] {
            assert!(!script.contains(VERSION_TOKEN));
            assert!(script.contains(PROTOCOL_VERSION));
        }
        assert!(scripts
            .monitor
            .contains(&format!("VERSION=\"{}\"", PROTOCOL_VERSION)));
    }

    #[test]
    fn test_render_replaces_every_token() {
        assert_eq!(render("a __VERSION__ b __VERSION__", "9.9"), "a 9.9 b 9.9");
    }

    #[test]
    fn test_layout_commands() {
        let layout = RemoteLayout::new(".sesswatch/");
        assert_eq!(layout.monitor_command(), "\"$HOME/.sesswatch/monitor.sh\"");
        assert_eq!(layout.mkdir_command(), "mkdir -p \"$HOME/.sesswatch/hooks\"");
        assert_eq!(
            layout.chmod_command(),
            "chmod +x \"$HOME/.sesswatch/hooks/status-hook.sh\" \"$HOME/.sesswatch/monitor.sh\""
        );
        assert_eq!(
            layout.configure_command(),
            "bash -s -- \"$HOME/.sesswatch/hooks/status-hook.sh\""
        );
        assert_eq!(
            RemoteLayout::write_command(&layout.monitor_path()),
            "cat > \"$HOME/.sesswatch/monitor.sh\""
        );
    }
}
