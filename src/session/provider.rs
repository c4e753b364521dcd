use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Point-in-time view of the authenticated session, borrowed from the
/// identity service. The monitor never stores one of these beyond a single
/// check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// The identity service a session monitor supervises against.
///
/// `AuthClient` implements this for the hosted service; tests substitute
/// their own.
///
/// There is deliberately no change-notification callback here: the monitor
/// re-reads `current_session` on every tick, so a session replaced or
/// revoked between ticks is picked up within one check interval.
pub trait IdentityProvider: Send + Sync {
    /// The current session, if one exists.
    fn current_session(&self) -> impl Future<Output = Option<SessionInfo>> + Send;

    /// Exchange the current session for a fresh one.
    fn refresh_session(&self) -> impl Future<Output = Result<SessionInfo>> + Send;

    /// Terminate the current session.
    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;
}
