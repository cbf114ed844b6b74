//! Auth endpoint client for the hosted platform.
//!
//! Wraps the platform's token-based auth API:
//!
//! - `POST /auth/v1/signup` - account registration (profile metadata rides
//!   along under `data`)
//! - `POST /auth/v1/token?grant_type=password` - password sign-in
//! - `POST /auth/v1/token?grant_type=refresh_token` - access token refresh
//! - `POST /auth/v1/logout` - session revocation
//! - `GET  /auth/v1/authorize?provider=...` - OAuth hand-off URL
//!
//! Every state transition (sign-in, sign-out, refresh) is broadcast as a
//! [`SessionChange`] so the auth store can follow along without polling.

use chrono::{Duration, Utc};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use url::Url;

use super::types::{AuthErrorBody, TokenResponse};
use super::{
    BackendError, Credentials, OAuthProvider, Session, SessionChange, SessionEvent,
    SignUpRequest, StoredSession, TokenStore,
};

/// Refresh the access token this long before it actually expires, so a
/// request issued right at the boundary doesn't race the clock.
const EXPIRY_SKEW_SECONDS: i64 = 30;

/// Client for the platform's auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    tokens: TokenStore,
    changes: broadcast::Sender<SessionChange>,
}

impl AuthClient {
    pub(crate) const fn new(
        http: reqwest::Client,
        base: Url,
        anon_key: SecretString,
        tokens: TokenStore,
        changes: broadcast::Sender<SessionChange>,
    ) -> Self {
        Self {
            http,
            base,
            anon_key,
            tokens,
            changes,
        }
    }

    /// Subscribe to session-change notifications.
    ///
    /// Events are delivered asynchronously after the call that caused them
    /// returns; callers must not assume the session is updated the moment
    /// `sign_in_with_password` resolves.
    #[must_use]
    pub fn session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    /// Resolve the current session.
    ///
    /// Returns `None` when signed out. An expired access token is refreshed
    /// transparently; if the refresh is rejected the local session is
    /// discarded and `None` is returned (degrade toward signed out, never
    /// toward a stale identity).
    ///
    /// # Errors
    ///
    /// Returns transport errors from the refresh call. A *rejected* refresh
    /// is not an error.
    pub async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(stored) = self.tokens.get() else {
            return Ok(None);
        };

        if stored.expires_at - Duration::seconds(EXPIRY_SKEW_SECONDS) > Utc::now() {
            return Ok(Some(stored.session));
        }

        match self.refresh(&stored.refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(BackendError::Auth(reason)) => {
                tracing::warn!(%reason, "token refresh rejected, discarding session");
                self.tokens.clear();
                self.broadcast(SessionEvent::SignedOut, None);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Register a new account.
    ///
    /// When the platform is configured to auto-confirm, the response carries
    /// a session which is adopted immediately; otherwise the user confirms
    /// by email and signs in later.
    ///
    /// # Errors
    ///
    /// Propagates the platform's rejection verbatim (duplicate email, weak
    /// password, ...).
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<(), BackendError> {
        let mut metadata = serde_json::Map::new();
        if let Some(full_name) = request.full_name {
            metadata.insert("full_name".into(), full_name.into());
        }
        if let Some(avatar_url) = request.avatar_url {
            metadata.insert("avatar_url".into(), avatar_url.into());
        }

        let body = serde_json::json!({
            "email": request.email.as_str(),
            "password": request.password.expose_secret(),
            "data": metadata,
        });

        let response = self
            .http
            .post(self.endpoint("signup")?)
            .header("apikey", self.anon_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let payload: serde_json::Value = Self::check(response).await?.json().await?;

        // Auto-confirm deployments return the session inline.
        if payload.get("access_token").is_some()
            && let Ok(grant) = serde_json::from_value::<TokenResponse>(payload)
        {
            self.adopt(grant, SessionEvent::SignedIn);
        }

        Ok(())
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Propagates the platform's rejection verbatim (invalid credentials,
    /// unconfirmed email, ...).
    pub async fn sign_in_with_password(
        &self,
        credentials: Credentials,
    ) -> Result<(), BackendError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let body = serde_json::json!({
            "email": credentials.email.as_str(),
            "password": credentials.password.expose_secret(),
        });

        let response = self
            .http
            .post(url)
            .header("apikey", self.anon_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let grant: TokenResponse = Self::check(response).await?.json().await?;
        self.adopt(grant, SessionEvent::SignedIn);
        Ok(())
    }

    /// Build the OAuth hand-off URL for a third-party provider.
    ///
    /// The caller redirects the user there; the platform completes the
    /// dance and the resulting session arrives as a session-change event.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Url` if the endpoint cannot be constructed.
    pub fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<Url, BackendError> {
        let state: String = {
            let mut rng = rand::rng();
            (0..32)
                .map(|_| format!("{:x}", rng.random_range(0..16)))
                .collect()
        };

        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("state", &state);
        Ok(url)
    }

    /// End the current session.
    ///
    /// The local session is always discarded and a signed-out event
    /// broadcast, even if the revocation request fails; the error is still
    /// propagated so the caller can surface it.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the revocation call.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(stored) = self.tokens.clear() else {
            return Ok(());
        };
        self.broadcast(SessionEvent::SignedOut, None);

        let response = self
            .http
            .post(self.endpoint("logout")?)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(stored.access_token.expose_secret())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .http
            .post(url)
            .header("apikey", self.anon_key.expose_secret())
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let grant: TokenResponse = Self::check(response).await?.json().await?;
        Ok(self.adopt(grant, SessionEvent::TokenRefreshed))
    }

    /// Store a token grant and broadcast the corresponding event.
    fn adopt(&self, grant: TokenResponse, event: SessionEvent) -> Session {
        let session = Session::from(grant.user);
        self.tokens.set(StoredSession {
            session: session.clone(),
            access_token: SecretString::from(grant.access_token),
            refresh_token: grant.refresh_token,
            expires_at: Utc::now() + Duration::seconds(grant.expires_in),
        });
        self.broadcast(event, Some(session.clone()));
        session
    }

    fn broadcast(&self, event: SessionEvent, session: Option<Session>) {
        // No receivers is fine; the stores may not be wired up yet.
        let _ = self.changes.send(SessionChange { event, session });
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base.join(&format!("auth/v1/{path}"))?)
    }

    /// Fold a non-success response into a [`BackendError::Auth`] carrying
    /// the platform's own description.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<AuthErrorBody>().await {
            Ok(body) => body
                .error_description
                .unwrap_or_else(|| format!("auth request failed with {status}")),
            Err(_) => format!("auth request failed with {status}"),
        };
        Err(BackendError::Auth(message))
    }
}
