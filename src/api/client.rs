use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::session::{IdentityProvider, SessionInfo};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Public IP echo endpoint used to tag failed sign-in attempts.
const IP_ECHO_URL: &str = "https://api.ipify.org?format=json";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An issued session: tokens plus the computed expiry instant.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    /// Unix seconds; newer service versions send the absolute instant too.
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpEchoResponse {
    ip: String,
}

/// Client for the hosted identity service's REST auth endpoints.
///
/// Holds the current session, so it doubles as the `IdentityProvider` the
/// session monitor supervises.
pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<AuthSession>>,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session: RwLock::new(None),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Sign in with email and password; the issued session becomes current.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let response = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session = Self::parse_session(response).await?;
        info!(user_id = %session.user.id, "Signed in");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Exchange the current refresh token for a fresh session.
    pub async fn refresh(&self) -> Result<AuthSession, ApiError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.refresh_token.clone())
            .ok_or(ApiError::Unauthorized)?;

        let response = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let session = Self::parse_session(response).await?;
        debug!(
            expires_at = %session.expires_at,
            "Session refreshed"
        );
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Revoke the current session. The local session is dropped even when
    /// the revocation call fails; the tokens are already untrusted by then.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", &self.api_key)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", session.access_token),
            )
            .send()
            .await?;

        // A 401 here just means the token already lapsed server-side.
        let status = response.status();
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        Ok(())
    }

    /// The session currently held, if any.
    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    /// Adopt a session restored from elsewhere (e.g. a persisted token).
    pub async fn restore_session(&self, session: AuthSession) {
        *self.session.write().await = Some(session);
    }

    /// Best-effort public IP lookup via an echo service. The result is
    /// client-reported and only used to tag attempt records.
    pub async fn lookup_client_ip(&self) -> Option<String> {
        let result = async {
            self.client
                .get(IP_ECHO_URL)
                .send()
                .await?
                .json::<IpEchoResponse>()
                .await
        }
        .await;

        match result {
            Ok(echo) => Some(echo.ip),
            Err(e) => {
                debug!(error = %e, "Client IP lookup failed");
                None
            }
        }
    }

    async fn parse_session(response: reqwest::Response) -> Result<AuthSession, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(token.into_session())
    }
}

impl IdentityProvider for AuthClient {
    async fn current_session(&self) -> Option<SessionInfo> {
        self.session.read().await.as_ref().map(|session| SessionInfo {
            user_id: session.user.id.clone(),
            expires_at: session.expires_at,
        })
    }

    async fn refresh_session(&self) -> Result<SessionInfo> {
        let session = self.refresh().await.context("Failed to refresh session")?;
        Ok(SessionInfo {
            user_id: session.user.id.clone(),
            expires_at: session.expires_at,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.logout().await.context("Failed to sign out")?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
