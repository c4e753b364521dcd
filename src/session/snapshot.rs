use chrono::{DateTime, Duration, Utc};

use crate::activity::ActivityStore;

use super::provider::SessionInfo;

/// Warn the user when expiry is this close, in minutes
pub const WARNING_THRESHOLD_MINUTES: i64 = 5;

/// Auto-refresh when expiry is this close, in minutes.
/// Sits inside the warning window, so both can apply on the same check.
pub const AUTO_REFRESH_THRESHOLD_MINUTES: i64 = 2;

/// Derived view of the current session, recomputed on every check and never
/// persisted.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub expires_at: DateTime<Utc>,
    /// Negative once the session has expired.
    pub time_until_expiry: Duration,
    pub is_inactive: bool,
}

impl SessionSnapshot {
    /// Capture the session state as of now.
    pub fn capture(session: &SessionInfo, activity: &ActivityStore) -> Self {
        Self::at(session, Utc::now(), activity.is_session_inactive())
    }

    fn at(session: &SessionInfo, now: DateTime<Utc>, is_inactive: bool) -> Self {
        Self {
            expires_at: session.expires_at,
            time_until_expiry: session.expires_at - now,
            is_inactive,
        }
    }

    pub fn should_show_warning(&self) -> bool {
        self.time_until_expiry > Duration::zero()
            && self.time_until_expiry <= Duration::minutes(WARNING_THRESHOLD_MINUTES)
    }

    pub fn should_auto_refresh(&self) -> bool {
        self.time_until_expiry > Duration::zero()
            && self.time_until_expiry <= Duration::minutes(AUTO_REFRESH_THRESHOLD_MINUTES)
    }

    pub fn is_expired(&self) -> bool {
        self.time_until_expiry <= Duration::zero()
    }
}
