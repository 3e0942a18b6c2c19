//! Time utilities for sesswatch

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is before the Unix epoch.
pub fn current_time_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Whether a timestamp is older than `max_age` at `now`
pub fn is_stale(updated_at_secs: i64, now_secs: i64, max_age: Duration) -> bool {
    now_secs.saturating_sub(updated_at_secs) > max_age.as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_secs_is_positive() {
        assert!(current_time_secs() > 0);
    }

    #[test]
    fn test_is_stale() {
        let max = Duration::from_secs(300);
        assert!(!is_stale(1_000, 1_300, max));
        assert!(is_stale(1_000, 1_301, max));
        // Future timestamps are never stale
        assert!(!is_stale(2_000, 1_000, max));
    }
}
