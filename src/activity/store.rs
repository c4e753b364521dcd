use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::storage::KeyValueStore;

/// Storage key for the remember-me flag (`"true"` or absent)
const REMEMBER_ME_KEY: &str = "rememberMe";

/// Storage key for the remembered email
const USER_EMAIL_KEY: &str = "userEmail";

/// Storage key for the last-activity timestamp (milliseconds since epoch)
const LAST_ACTIVITY_KEY: &str = "lastActivity";

/// Inactivity timeout for regular sessions, in minutes
pub const INACTIVITY_DEFAULT_MINUTES: i64 = 30;

/// Inactivity timeout for remembered sessions, in minutes
pub const INACTIVITY_REMEMBERED_MINUTES: i64 = 120;

/// The persisted remember-me choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberMe {
    pub is_remembered: bool,
    pub remembered_email: Option<String>,
}

/// Activity summary for the settings page.
#[derive(Debug, Clone)]
pub struct SessionActivityInfo {
    pub is_remembered: bool,
    pub inactivity_timeout: Duration,
    pub last_activity: DateTime<Utc>,
    pub time_since_last_activity: Duration,
}

/// Durable bookkeeping of user activity and the remember-me preference.
///
/// Storage failures degrade to in-memory defaults: a failed write leaves the
/// previous timestamp authoritative, a failed read behaves as if the key were
/// absent. Nothing here propagates an error to the caller.
#[derive(Clone)]
pub struct ActivityStore {
    store: Arc<dyn KeyValueStore>,
}

impl ActivityStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Record "now" as the last qualifying user interaction.
    pub fn update_last_activity(&self) {
        let now = Utc::now().timestamp_millis().to_string();
        if let Err(e) = self.store.set(LAST_ACTIVITY_KEY, &now) {
            warn!(error = %e, "Failed to record last activity");
        }
    }

    /// Last recorded interaction. An absent or unreadable value counts as
    /// "now" so a fresh profile is never instantly inactive.
    pub fn last_activity(&self) -> DateTime<Utc> {
        match self.store.get(LAST_ACTIVITY_KEY) {
            Ok(Some(raw)) => raw
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_else(Utc::now),
            Ok(None) => Utc::now(),
            Err(e) => {
                warn!(error = %e, "Failed to read last activity");
                Utc::now()
            }
        }
    }

    /// Whether the user has been idle past the applicable timeout.
    pub fn is_session_inactive(&self) -> bool {
        Utc::now() - self.last_activity() >= self.inactivity_timeout()
    }

    /// Timeout selected from the remember-me preference: remembered sessions
    /// get the long timeout, everything else the default.
    pub fn inactivity_timeout(&self) -> Duration {
        if self.remember_me().is_remembered {
            Duration::minutes(INACTIVITY_REMEMBERED_MINUTES)
        } else {
            Duration::minutes(INACTIVITY_DEFAULT_MINUTES)
        }
    }

    pub fn remember_me(&self) -> RememberMe {
        let is_remembered = match self.store.get(REMEMBER_ME_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(error = %e, "Failed to read remember-me flag");
                false
            }
        };
        let remembered_email = match self.store.get(USER_EMAIL_KEY) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read remembered email");
                None
            }
        };
        RememberMe {
            is_remembered,
            remembered_email,
        }
    }

    /// Persist the remember-me choice. Turning it off removes the flag and
    /// the remembered email together.
    pub fn set_remember_me(&self, remember: bool, email: Option<&str>) {
        let result = if remember {
            self.store.set(REMEMBER_ME_KEY, "true").and_then(|()| {
                match email.filter(|email| !email.is_empty()) {
                    Some(email) => self.store.set(USER_EMAIL_KEY, email),
                    None => Ok(()),
                }
            })
        } else {
            self.store
                .remove(REMEMBER_ME_KEY)
                .and_then(|()| self.store.remove(USER_EMAIL_KEY))
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist remember-me preference");
        }
    }

    /// Wipe remember-me flag, remembered email, and last-activity timestamp.
    /// Called only on explicit sign-out; a forced expiry leaves the previous
    /// choice readable for the next login.
    pub fn clear(&self) {
        for key in [REMEMBER_ME_KEY, USER_EMAIL_KEY, LAST_ACTIVITY_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to clear session preference");
            }
        }
    }

    /// Snapshot of the activity state for display.
    pub fn session_info(&self) -> SessionActivityInfo {
        let is_remembered = self.remember_me().is_remembered;
        let inactivity_timeout = self.inactivity_timeout();
        let last_activity = self.last_activity();
        SessionActivityInfo {
            is_remembered,
            inactivity_timeout,
            last_activity,
            time_since_last_activity: Utc::now() - last_activity,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> ActivityStore {
        ActivityStore::new(Arc::new(MemoryStore::new()))
    }

    /// Back-date the persisted last-activity timestamp.
    fn backdate_activity(activity: &ActivityStore, minutes: i64) {
        let then = Utc::now() - Duration::minutes(minutes);
        activity
            .store
            .set(LAST_ACTIVITY_KEY, &then.timestamp_millis().to_string())
            .unwrap();
    }

    #[test]
    fn test_remember_me_roundtrip() {
        let activity = store();
        activity.set_remember_me(true, Some("a@b.com"));

        let pref = activity.remember_me();
        assert!(pref.is_remembered);
        assert_eq!(pref.remembered_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_remember_me_off_clears_both_fields() {
        let activity = store();
        activity.set_remember_me(true, Some("a@b.com"));
        activity.set_remember_me(false, None);

        let pref = activity.remember_me();
        assert!(!pref.is_remembered);
        assert_eq!(pref.remembered_email, None);
    }

    #[test]
    fn test_absent_flag_defaults_to_not_remembered() {
        assert!(!store().remember_me().is_remembered);
    }

    #[test]
    fn test_inactivity_timeout_selection() {
        let activity = store();
        assert_eq!(
            activity.inactivity_timeout(),
            Duration::minutes(INACTIVITY_DEFAULT_MINUTES)
        );

        activity.set_remember_me(true, None);
        assert_eq!(
            activity.inactivity_timeout(),
            Duration::minutes(INACTIVITY_REMEMBERED_MINUTES)
        );
    }

    #[test]
    fn test_inactive_past_default_timeout() {
        let activity = store();
        backdate_activity(&activity, 31);
        assert!(activity.is_session_inactive());
    }

    #[test]
    fn test_remembered_session_tolerates_longer_idle() {
        let activity = store();
        activity.set_remember_me(true, None);
        backdate_activity(&activity, 31);
        assert!(!activity.is_session_inactive());

        backdate_activity(&activity, 121);
        assert!(activity.is_session_inactive());
    }

    #[test]
    fn test_update_last_activity_is_idempotent() {
        let activity = store();
        activity.update_last_activity();
        activity.update_last_activity();
        assert!(!activity.is_session_inactive());
    }

    #[test]
    fn test_absent_activity_counts_as_now() {
        assert!(!store().is_session_inactive());
    }

    #[test]
    fn test_malformed_activity_counts_as_now() {
        let activity = store();
        activity.store.set(LAST_ACTIVITY_KEY, "yesterday-ish").unwrap();
        assert!(!activity.is_session_inactive());
    }

    #[test]
    fn test_clear_wipes_preferences_and_activity() {
        let activity = store();
        activity.set_remember_me(true, Some("a@b.com"));
        activity.update_last_activity();

        activity.clear();

        let pref = activity.remember_me();
        assert!(!pref.is_remembered);
        assert_eq!(pref.remembered_email, None);
        assert!(activity.store.get(LAST_ACTIVITY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_session_info_reflects_preference() {
        let activity = store();
        activity.set_remember_me(true, Some("a@b.com"));
        activity.update_last_activity();

        let info = activity.session_info();
        assert!(info.is_remembered);
        assert_eq!(
            info.inactivity_timeout,
            Duration::minutes(INACTIVITY_REMEMBERED_MINUTES)
        );
        assert!(info.time_since_last_activity < Duration::minutes(1));
    }
}
