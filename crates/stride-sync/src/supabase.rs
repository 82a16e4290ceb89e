//! # GoTrue Auth Provider
//!
//! [`AuthProvider`] backed by a GoTrue-compatible REST API (Supabase Auth).
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation          Request                                            │
//! │  ─────────────────  ─────────────────────────────────────────────────  │
//! │  sign_in            POST /auth/v1/token?grant_type=password            │
//! │  refresh            POST /auth/v1/token?grant_type=refresh_token       │
//! │  sign_up            POST /auth/v1/signup        {email, password, data}│
//! │  oauth_url          GET  /auth/v1/authorize?provider=…&redirect_to=…   │
//! │  sign_out           POST /auth/v1/logout        (Bearer)               │
//! │  reset_password     POST /auth/v1/recover?redirect_to=…  {email}       │
//! │  update_password    PUT  /auth/v1/user          (Bearer) {password}    │
//! │                                                                         │
//! │  Every request carries `apikey: <anon key>`.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session is persisted as JSON next to the database so the next start
//! can restore it. Sessions pushed through `store_session` (deep links,
//! token refresh) land in the same file. An expired session is refreshed on restore; if the
//! service cannot be reached the stale session is kept, since the app works
//! against the local store anyway.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use stride_core::{AuthSession, OAuthProvider, SignUpMetadata, UserProfile};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};
use crate::session::AuthProvider;

/// File name of the persisted session.
pub const SESSION_FILE_NAME: &str = "session.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Configuration
// =============================================================================

/// Settings for [`GoTrueAuthProvider`].
#[derive(Debug, Clone)]
pub struct GoTrueConfig {
    /// Project base URL, e.g. `https://project.supabase.co`.
    pub url: Url,

    /// Public anon key.
    pub anon_key: String,

    /// Where to persist the session; `None` keeps it in memory only.
    pub session_file: Option<PathBuf>,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct UserMetadata {
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + ChronoDuration::seconds(secs)));

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: UserProfile {
                id: self.user.id,
                email: self.user.email.unwrap_or_default(),
                first_name: self.user.user_metadata.first_name,
                last_name: self.user.user_metadata.last_name,
            },
        }
    }
}

/// Maps an error response to an [`AuthError`].
fn map_error(status: u16, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("auth service returned HTTP {status}"));

    if status == 400 && message.to_lowercase().contains("invalid login credentials") {
        return AuthError::InvalidCredentials;
    }
    AuthError::Provider { status, message }
}

// =============================================================================
// Provider
// =============================================================================

/// GoTrue REST client.
pub struct GoTrueAuthProvider {
    client: Client,
    base: Url,
    anon_key: String,
    session_file: Option<PathBuf>,
}

impl GoTrueAuthProvider {
    /// Creates the client.
    pub fn new(config: GoTrueConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let mut base = config.url;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(GoTrueAuthProvider {
            client,
            base,
            anon_key: config.anon_key,
            session_file: config.session_file,
        })
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        self.base
            .join("auth/v1/")
            .and_then(|u| u.join(path))
            .map_err(|e| AuthError::InvalidResponse(format!("bad endpoint {path}: {e}")))
    }

    fn request(&self, builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        let builder = builder.header("apikey", &self.anon_key);
        match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> AuthResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error(status.as_u16(), &body))
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> AuthResult<AuthSession> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .request(self.client.post(url), None)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = Self::check(response).await?.json().await?;
        Ok(token.into_session(Utc::now()))
    }

    // =========================================================================
    // Session Persistence
    // =========================================================================

    async fn load_persisted(&self) -> AuthResult<Option<AuthSession>> {
        let Some(path) = &self.session_file else {
            return Ok(None);
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    warn!(?path, error = %e, "Discarding unreadable persisted session");
                    self.forget().await;
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    async fn persist(&self, session: &AuthSession) {
        let Some(path) = &self.session_file else {
            return;
        };
        let result = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let bytes = serde_json::to_vec(session).map_err(std::io::Error::other)?;
            tokio::fs::write(path, bytes).await
        }
        .await;
        if let Err(e) = result {
            warn!(?path, error = %e, "Failed to persist session");
        }
    }

    async fn forget(&self) {
        if let Some(path) = &self.session_file {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(?path, "Persisted session removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(?path, error = %e, "Failed to remove persisted session"),
            }
        }
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuthProvider {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(session) = self.load_persisted().await? else {
            return Ok(None);
        };
        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            info!("Persisted session expired without a refresh token");
            self.forget().await;
            return Ok(None);
        };

        match self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(refreshed) => {
                debug!(user_id = %refreshed.user_id(), "Restored session refreshed");
                self.persist(&refreshed).await;
                Ok(Some(refreshed))
            }
            Err(AuthError::Network(e)) => {
                warn!(error = %e, "Auth service unreachable, keeping expired session");
                Ok(Some(session))
            }
            Err(e) => {
                info!(error = %e, "Persisted session rejected, signing out");
                self.forget().await;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.persist(&session).await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> AuthResult<Option<AuthSession>> {
        let data = UserMetadata {
            first_name: metadata.first_name.clone(),
            last_name: metadata.last_name.clone(),
        };
        let response = self
            .request(self.client.post(self.endpoint("signup")?), None)
            .json(&json!({ "email": email, "password": password, "data": data }))
            .send()
            .await?;
        let body: serde_json::Value = Self::check(response).await?.json().await?;

        // Without auto-confirm the service returns only the user.
        if body.get("access_token").is_none() {
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let session = token.into_session(Utc::now());
        self.persist(&session).await;
        Ok(Some(session))
    }

    fn oauth_url(&self, provider: OAuthProvider, redirect_to: Option<&str>) -> AuthResult<String> {
        let mut url = self.endpoint("authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", provider.as_str());
            if let Some(redirect) = redirect_to {
                query.append_pair("redirect_to", redirect);
            }
        }
        Ok(url.to_string())
    }

    async fn sign_out(&self, session: &AuthSession) -> AuthResult<()> {
        self.forget().await;
        let response = self
            .request(
                self.client.post(self.endpoint("logout")?),
                Some(&session.access_token),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn reset_password(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        let mut url = self.endpoint("recover")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        let response = self
            .request(self.client.post(url), None)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_password(&self, session: &AuthSession, new_password: &str) -> AuthResult<()> {
        let response = self
            .request(
                self.client.put(self.endpoint("user")?),
                Some(&session.access_token),
            )
            .json(&json!({ "password": new_password }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn store_session(&self, session: Option<&AuthSession>) -> AuthResult<()> {
        match session {
            Some(session) => self.persist(session).await,
            None => self.forget().await,
        }
        Ok(())
    }
}
