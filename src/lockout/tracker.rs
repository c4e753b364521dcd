use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::KeyValueStore;

/// Storage key for the attempt map
const ATTEMPTS_KEY: &str = "login_attempts";

/// Failed attempts inside the window before an identifier is locked
pub const MAX_ATTEMPTS: usize = 5;

/// How long a locked identifier stays locked, in minutes
pub const LOCKOUT_MINUTES: i64 = 15;

/// Sliding window in minutes; attempts older than this never count
pub const ATTEMPT_WINDOW_MINUTES: i64 = 60;

/// Extra detail recorded alongside a failed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttemptEntry {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    context: AttemptContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AttemptRecord {
    #[serde(default)]
    attempts: Vec<AttemptEntry>,
    #[serde(default)]
    locked_until: Option<DateTime<Utc>>,
}

/// Lockout state for one identifier, surfaced to the sign-in flow so it can
/// render a countdown instead of a generic error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutStatus {
    pub is_locked_out: bool,
    pub remaining_time: Duration,
    pub attempts: usize,
}

impl LockoutStatus {
    fn unlocked(attempts: usize) -> Self {
        Self {
            is_locked_out: false,
            remaining_time: Duration::zero(),
            attempts,
        }
    }
}

/// One in-window failed attempt, flattened for admin display.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
    pub context: AttemptContext,
    pub currently_locked: bool,
}

/// Per-identifier failed-attempt bookkeeping with sliding-window lockout.
///
/// All reads prune entries older than the window before counting, so a stale
/// lock can never outlive the attempts that caused it.
#[derive(Clone)]
pub struct AttemptTracker {
    store: Arc<dyn KeyValueStore>,
}

impl AttemptTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Check whether an identifier is currently locked out, lazily pruning
    /// attempts that have aged out of the window.
    pub fn check_status(&self, identifier: &str) -> LockoutStatus {
        let mut data = self.load_data();
        let now = Utc::now();

        let Some(record) = data.get(identifier) else {
            return LockoutStatus::unlocked(0);
        };

        if let Some(locked_until) = record.locked_until {
            if now < locked_until {
                return LockoutStatus {
                    is_locked_out: true,
                    remaining_time: locked_until - now,
                    attempts: record.attempts.len(),
                };
            }
        }

        let recent = Self::prune(&record.attempts, now);
        if recent.len() != record.attempts.len() {
            // The lock must not outlive the attempts that caused it.
            data.insert(
                identifier.to_string(),
                AttemptRecord {
                    attempts: recent.clone(),
                    locked_until: None,
                },
            );
            self.save_data(&data);
        }

        LockoutStatus::unlocked(recent.len())
    }

    /// Record a failed attempt under the email and, when known, the client
    /// IP, so either identifier can trip the lockout on its own. Returns the
    /// updated status for the email key.
    pub fn record_failure(
        &self,
        email: &str,
        ip_address: Option<&str>,
        context: AttemptContext,
    ) -> LockoutStatus {
        let mut data = self.load_data();
        let now = Utc::now();

        Self::push_attempt(
            &mut data,
            email,
            now,
            AttemptContext {
                ip_address: ip_address.map(str::to_string),
                email: None,
                ..context.clone()
            },
        );

        if let Some(ip) = ip_address {
            Self::push_attempt(
                &mut data,
                ip,
                now,
                AttemptContext {
                    email: Some(email.to_string()),
                    ip_address: None,
                    ..context
                },
            );
        }

        self.save_data(&data);
        self.check_status(email)
    }

    /// Delete the records for an identifier pair after a verified successful
    /// sign-in. Idempotent.
    pub fn clear(&self, email: &str, ip_address: Option<&str>) {
        let mut data = self.load_data();
        data.remove(email);
        if let Some(ip) = ip_address {
            data.remove(ip);
        }
        self.save_data(&data);
    }

    /// Flattened, newest-first listing of every in-window attempt, for the
    /// admin security view.
    pub fn recent_attempts(&self, limit: usize) -> Vec<FailedAttempt> {
        let data = self.load_data();
        let now = Utc::now();
        let mut all = Vec::new();

        for (identifier, record) in &data {
            let currently_locked = record
                .locked_until
                .is_some_and(|locked_until| now < locked_until);
            for entry in Self::prune(&record.attempts, now) {
                all.push(FailedAttempt {
                    identifier: identifier.clone(),
                    timestamp: entry.timestamp,
                    context: entry.context,
                    currently_locked,
                });
            }
        }

        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit);
        all
    }

    /// Administrative wipe of all attempt records.
    pub fn clear_all(&self) {
        if let Err(e) = self.store.remove(ATTEMPTS_KEY) {
            warn!(error = %e, "Failed to clear login attempt data");
        }
    }

    fn push_attempt(
        data: &mut BTreeMap<String, AttemptRecord>,
        identifier: &str,
        now: DateTime<Utc>,
        context: AttemptContext,
    ) {
        let record = data.entry(identifier.to_string()).or_default();
        record.attempts = Self::prune(&record.attempts, now);
        record.attempts.push(AttemptEntry {
            timestamp: now,
            context,
        });

        if record.attempts.len() >= MAX_ATTEMPTS {
            record.locked_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
            warn!(
                identifier,
                attempts = record.attempts.len(),
                "Sign-in lockout triggered"
            );
        }
    }

    fn prune(attempts: &[AttemptEntry], now: DateTime<Utc>) -> Vec<AttemptEntry> {
        attempts
            .iter()
            .filter(|entry| now - entry.timestamp < Duration::minutes(ATTEMPT_WINDOW_MINUTES))
            .cloned()
            .collect()
    }

    fn load_data(&self) -> BTreeMap<String, AttemptRecord> {
        match self.store.get(ATTEMPTS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "Malformed login attempt data, starting fresh");
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read login attempt data");
                BTreeMap::new()
            }
        }
    }

    fn save_data(&self, data: &BTreeMap<String, AttemptRecord>) {
        match serde_json::to_string(data) {
            Ok(raw) => {
                if let Err(e) = self.store.set(ATTEMPTS_KEY, &raw) {
                    warn!(error = %e, "Failed to persist login attempt data");
                }
            }
            Err(e) => {
                debug!(error = %e, "Failed to serialize login attempt data");
            }
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

    fn tracker() -> AttemptTracker {
        AttemptTracker::new(Arc::new(MemoryStore::new()))
    }

    /// Write a record with back-dated attempts directly into the store.
    fn seed_record(
        tracker: &AttemptTracker,
        identifier: &str,
        ages_minutes: &[i64],
        locked_until: Option<DateTime<Utc>>,
    ) {
        let now = Utc::now();
        let mut data = BTreeMap::new();
        data.insert(
            identifier.to_string(),
            AttemptRecord {
                attempts: ages_minutes
                    .iter()
                    .map(|minutes| AttemptEntry {
                        timestamp: now - Duration::minutes(*minutes),
                        context: AttemptContext::default(),
                    })
                    .collect(),
                locked_until,
            },
        );
        tracker
            .store
            .set(ATTEMPTS_KEY, &serde_json::to_string(&data).unwrap())
            .unwrap();
    }

    #[test]
    fn test_unknown_identifier_is_clear() {
        let status = tracker().check_status("nobody@plateful.dev");
        assert!(!status.is_locked_out);
        assert_eq!(status.attempts, 0);
        assert_eq!(status.remaining_time, Duration::zero());
    }

    #[test]
    fn test_lockout_after_max_attempts() {
        let tracker = tracker();
        for _ in 0..MAX_ATTEMPTS - 1 {
            let status =
                tracker.record_failure("admin@plateful.dev", None, AttemptContext::default());
            assert!(!status.is_locked_out);
        }

        let status = tracker.record_failure("admin@plateful.dev", None, AttemptContext::default());
        assert!(status.is_locked_out);
        assert_eq!(status.attempts, MAX_ATTEMPTS);
        assert!(status.remaining_time > Duration::minutes(LOCKOUT_MINUTES - 1));
        assert!(status.remaining_time <= Duration::minutes(LOCKOUT_MINUTES));
    }

    #[test]
    fn test_old_attempts_never_count() {
        let tracker = tracker();
        // Four attempts just past the window, then one fresh failure.
        seed_record(
            &tracker,
            "admin@plateful.dev",
            &[61, 65, 70, 90],
            None,
        );

        let status = tracker.record_failure("admin@plateful.dev", None, AttemptContext::default());
        assert!(!status.is_locked_out);
        assert_eq!(status.attempts, 1);
    }

    #[test]
    fn test_stale_lock_reset_by_pruning() {
        let tracker = tracker();
        // All attempts aged out but the lock field was left behind.
        seed_record(
            &tracker,
            "admin@plateful.dev",
            &[61, 62, 63, 64, 65],
            Some(Utc::now() - Duration::minutes(30)),
        );

        let status = tracker.check_status("admin@plateful.dev");
        assert!(!status.is_locked_out);
        assert_eq!(status.attempts, 0);

        // The persisted record must have the lock unset, not just unreported.
        let raw = tracker.store.get(ATTEMPTS_KEY).unwrap().unwrap();
        let data: BTreeMap<String, AttemptRecord> = serde_json::from_str(&raw).unwrap();
        assert!(data["admin@plateful.dev"].locked_until.is_none());
    }

    #[test]
    fn test_ip_key_locks_independently() {
        let tracker = tracker();
        for i in 0..MAX_ATTEMPTS {
            let email = format!("user{}@plateful.dev", i);
            tracker.record_failure(&email, Some("203.0.113.9"), AttemptContext::default());
        }

        // No single email reached the threshold, but the shared IP did.
        assert!(!tracker.check_status("user0@plateful.dev").is_locked_out);
        assert!(tracker.check_status("203.0.113.9").is_locked_out);
    }

    #[test]
    fn test_clear_removes_both_keys_and_is_idempotent() {
        let tracker = tracker();
        tracker.record_failure(
            "admin@plateful.dev",
            Some("203.0.113.9"),
            AttemptContext::default(),
        );

        tracker.clear("admin@plateful.dev", Some("203.0.113.9"));
        assert_eq!(tracker.check_status("admin@plateful.dev").attempts, 0);
        assert_eq!(tracker.check_status("203.0.113.9").attempts, 0);

        // A second clear must be harmless.
        tracker.clear("admin@plateful.dev", Some("203.0.113.9"));
        assert_eq!(tracker.check_status("admin@plateful.dev").attempts, 0);
    }

    #[test]
    fn test_malformed_data_treated_as_absent() {
        let tracker = tracker();
        tracker.store.set(ATTEMPTS_KEY, "{not json").unwrap();

        let status = tracker.check_status("admin@plateful.dev");
        assert!(!status.is_locked_out);
        assert_eq!(status.attempts, 0);
    }

    #[test]
    fn test_recent_attempts_newest_first_with_limit() {
        let tracker = tracker();
        seed_record(&tracker, "admin@plateful.dev", &[50, 5, 20], None);

        let attempts = tracker.recent_attempts(2);
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].timestamp > attempts[1].timestamp);
        assert!(!attempts[0].currently_locked);
    }

    #[test]
    fn test_clear_all_wipes_everything() {
        let tracker = tracker();
        tracker.record_failure("admin@plateful.dev", None, AttemptContext::default());
        tracker.clear_all();
        assert_eq!(tracker.check_status("admin@plateful.dev").attempts, 0);
        assert!(tracker.recent_attempts(10).is_empty());
    }
}
