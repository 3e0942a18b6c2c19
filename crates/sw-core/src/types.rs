//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a monitor agent is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Encrypted remote shell (SSH)
    RemoteShell,
    /// Local virtualized command executor
    LocalSandbox,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::RemoteShell => write!(f, "ssh"),
            TransportKind::LocalSandbox => write!(f, "sandbox"),
        }
    }
}
