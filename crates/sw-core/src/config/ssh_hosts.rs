//! Host discovery from the conventional ssh client config file
//!
//! Only the keywords sesswatch needs are understood: `Host`, `HostName`,
//! `User`, `Port` and `IdentityFile`. Lookups follow ssh's first-match-wins
//! rule across every `Host` block whose pattern matches.

use std::path::{Path, PathBuf};

use super::target::{expand_home, ConnectionTarget, DEFAULT_SSH_PORT};
use crate::error::ConfigError;

/// A host alias discovered in the ssh config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshHost {
    pub alias: String,
    pub host_name: String,
    pub port: u16,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
}

impl SshHost {
    /// Convert into a remote-shell connection target
    pub fn to_target(&self) -> ConnectionTarget {
        ConnectionTarget {
            name: self.alias.clone(),
            host: self.host_name.clone(),
            port: self.port,
            user: self.user.clone().unwrap_or_default(),
            identity_file: self.identity_file.clone(),
            sandbox: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct HostBlock {
    patterns: Vec<String>,
    options: Vec<(String, String)>,
}

impl HostBlock {
    fn matches(&self, host: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match(negated, host) {
                    return false;
                }
            } else if glob_match(pattern, host) {
                matched = true;
            }
        }
        matched
    }
}

/// Parsed ssh client config
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    blocks: Vec<HostBlock>,
}

impl SshConfig {
    /// Parse config text; unknown keywords are kept but never consulted
    pub fn parse(content: &str) -> Self {
        // Options before the first Host line apply to every host
        let mut blocks = vec![HostBlock {
            patterns: vec!["*".to_string()],
            options: Vec::new(),
        }];

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (keyword, value) = match split_keyword(line) {
                Some(kv) => kv,
                None => continue,
            };

            if keyword.eq_ignore_ascii_case("host") {
                blocks.push(HostBlock {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    options: Vec::new(),
                });
            } else if keyword.eq_ignore_ascii_case("match") {
                // Match blocks are not supported; give them a pattern nothing matches
                blocks.push(HostBlock::default());
            } else if let Some(block) = blocks.last_mut() {
                block
                    .options
                    .push((keyword.to_ascii_lowercase(), unquote(value).to_string()));
            }
        }

        Self { blocks }
    }

    /// Load from a file; a missing file yields an empty config
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Invalid(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// First value of `key` for `host`
    pub fn get(&self, host: &str, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.blocks
            .iter()
            .filter(|block| block.matches(host))
            .flat_map(|block| block.options.iter())
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Concrete (non-wildcard) aliases in file order, without duplicates
    pub fn aliases(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for block in &self.blocks {
            for pattern in &block.patterns {
                let concrete =
                    !pattern.is_empty() && !pattern.contains(&['*', '?', '!'][..]);
                if concrete && !seen.contains(&pattern.as_str()) {
                    seen.push(pattern.as_str());
                }
            }
        }
        seen
    }

    /// Resolve every concrete alias into a host entry
    pub fn hosts(&self) -> Vec<SshHost> {
        self.aliases()
            .into_iter()
            .map(|alias| SshHost {
                alias: alias.to_string(),
                host_name: self.get(alias, "HostName").unwrap_or(alias).to_string(),
                port: self
                    .get(alias, "Port")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_SSH_PORT),
                user: self.get(alias, "User").map(str::to_string),
                identity_file: self
                    .get(alias, "IdentityFile")
                    .map(|p| expand_home(Path::new(p))),
            })
            .collect()
    }
}

/// List hosts from the ssh config at `path`
pub fn discover_hosts(path: &Path) -> Result<Vec<SshHost>, ConfigError> {
    Ok(SshConfig::load(path)?.hosts())
}

/// Fill in a target's missing details from the ssh config.
///
/// Missing user and identity file are taken from the config, a default port
/// is replaced by a configured one, and an alias is resolved to its real host
/// name. Sandbox targets are returned unchanged.
pub fn apply_ssh_config(target: &ConnectionTarget, ssh: &SshConfig) -> ConnectionTarget {
    let mut resolved = target.clone();
    if resolved.sandbox.is_some() {
        return resolved;
    }

    let alias = target.host.as_str();

    if resolved.user.is_empty() {
        if let Some(user) = ssh.get(alias, "User") {
            resolved.user = user.to_string();
        }
    }

    if resolved.identity_file.is_none() {
        if let Some(path) = ssh.get(alias, "IdentityFile") {
            resolved.identity_file = Some(expand_home(Path::new(path)));
        }
    }

    if resolved.port == DEFAULT_SSH_PORT {
        if let Some(port) = ssh.get(alias, "Port").and_then(|p| p.parse().ok()) {
            resolved.port = port;
        }
    }

    if let Some(host_name) = ssh.get(alias, "HostName") {
        resolved.host = host_name.to_string();
    }

    if resolved.name.is_empty() {
        resolved.name = alias.to_string();
    }

    resolved
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let keyword = &line[..idx];
    let value = line[idx..]
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=')
        .trim();
    if value.is_empty() {
        None
    } else {
        Some((keyword, value))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// ssh-style pattern matching (`*` and `?`)
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi].eq_ignore_ascii_case(&t[ti])) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}
