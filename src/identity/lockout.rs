//! Account lockout window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockout {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Open-ended lock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Lockout {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            enabled: true,
            start_time: Some(start),
            end_time: end,
        }
    }

    /// Whether the lock applies at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let started = self.start_time.is_none_or(|start| start <= now);
        let not_ended = self.end_time.is_none_or(|end| now < end);
        started && not_ended
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_window() {
        let now = Utc::now();
        let lock = Lockout::new(now, Some(now + TimeDelta::hours(1)));
        assert!(lock.is_locked(now));
        assert!(lock.is_locked(now + TimeDelta::minutes(59)));
        assert!(!lock.is_locked(now + TimeDelta::hours(1)));
        assert!(!lock.is_locked(now - TimeDelta::seconds(1)));

        assert!(Lockout::new(now, None).is_locked(now + TimeDelta::days(365)));
        assert!(!Lockout::default().is_locked(now));
    }
}
