use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::activity::ActivityStore;
use crate::api::{ApiError, AuthClient, AuthSession};
use crate::lockout::{AttemptContext, AttemptTracker};

/// Why a sign-in attempt was rejected.
#[derive(Debug, Error)]
pub enum SignInError {
    /// Too many recent failures; carries the countdown for display.
    #[error("Account temporarily locked due to too many failed attempts")]
    LockedOut {
        remaining_time: Duration,
        attempts: usize,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Sign-in flow for the admin console.
///
/// The lockout check runs before any network traffic, so a locked identifier
/// never reaches the identity service. Failed attempts are recorded under
/// the email and, best-effort, the client IP.
pub struct Authenticator {
    client: Arc<AuthClient>,
    attempts: AttemptTracker,
    activity: ActivityStore,
}

impl Authenticator {
    pub fn new(client: Arc<AuthClient>, attempts: AttemptTracker, activity: ActivityStore) -> Self {
        Self {
            client,
            attempts,
            activity,
        }
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<AuthSession, SignInError> {
        let status = self.attempts.check_status(email);
        if status.is_locked_out {
            warn!(email, attempts = status.attempts, "Sign-in blocked by lockout");
            return Err(SignInError::LockedOut {
                remaining_time: status.remaining_time,
                attempts: status.attempts,
            });
        }

        match self.client.sign_in_with_password(email, password).await {
            Ok(session) => {
                let ip_address = self.client.lookup_client_ip().await;
                self.attempts.clear(email, ip_address.as_deref());
                self.activity.set_remember_me(remember_me, Some(email));
                self.activity.update_last_activity();
                Ok(session)
            }
            Err(e) => {
                let ip_address = self.client.lookup_client_ip().await;
                let status = self.attempts.record_failure(
                    email,
                    ip_address.as_deref(),
                    AttemptContext {
                        error: Some(e.to_string()),
                        ..AttemptContext::default()
                    },
                );
                warn!(email, attempts = status.attempts, "Sign-in failed");
                Err(SignInError::Api(e))
            }
        }
    }

    /// Explicit user sign-out. Unlike a forced sign-out from the session
    /// monitor, this clears the persisted session preferences.
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.client.logout().await?;
        self.activity.clear();
        info!("Signed out");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
