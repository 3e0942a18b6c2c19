//! Session status records carried by `status` frames

use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity state of a single AI coding session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// The session is processing a prompt
    Working,
    /// The session is waiting for user input
    Idle,
    /// The session has ended
    Stopped,
}

impl SessionState {
    /// Wire representation of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Working => "working",
            SessionState::Idle => "idle",
            SessionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one session inside a project, as reported by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Project identifier (usually the project's directory path)
    #[serde(rename = "project")]
    pub project_id: String,
    /// Human-readable project name
    #[serde(rename = "project_name")]
    pub project_display_name: String,
    /// Session identifier; older agents omit it
    #[serde(default)]
    pub session_id: String,
    /// Current activity state
    pub status: SessionState,
    /// Last update, seconds since the Unix epoch
    #[serde(rename = "updated_at")]
    pub updated_at_epoch_secs: i64,
}

impl SessionStatus {
    /// Seconds elapsed between the last update and `now`.
    ///
    /// Returns 0 when the record is from the future (clock skew).
    pub fn age_secs(&self, now_epoch_secs: i64) -> u64 {
        now_epoch_secs
            .saturating_sub(self.updated_at_epoch_secs)
            .max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Working.to_string(), "working");
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_session_status_wire_names() {
        let status: SessionStatus = serde_json::from_str(
            r#"{"project":"/home/u/app","project_name":"app","session_id":"s1","status":"idle","updated_at":1700000000}"#,
        )
        .unwrap();

        assert_eq!(status.project_id, "/home/u/app");
        assert_eq!(status.project_display_name, "app");
        assert_eq!(status.session_id, "s1");
        assert_eq!(status.status, SessionState::Idle);
        assert_eq!(status.updated_at_epoch_secs, 1_700_000_000);
    }

    #[test]
    fn test_session_status_missing_session_id() {
        let status: SessionStatus = serde_json::from_str(
            r#"{"project":"p","project_name":"p","status":"working","updated_at":1}"#,
        )
        .unwrap();
        assert_eq!(status.session_id, "");
    }

    #[test]
    fn test_unknown_state_rejected() {
        let result: Result<SessionStatus, _> = serde_json::from_str(
            r#"{"project":"p","project_name":"p","status":"sleeping","updated_at":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_age_secs_clamps_future() {
        let status = SessionStatus {
            project_id: "p".into(),
            project_display_name: "p".into(),
            session_id: String::new(),
            status: SessionState::Idle,
            updated_at_epoch_secs: 200,
        };
        assert_eq!(status.age_secs(260), 60);
        assert_eq!(status.age_secs(100), 0);
    }
}
