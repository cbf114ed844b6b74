//! Hosted backend platform client.
//!
//! The storefront core consumes exactly two capability surfaces from the
//! platform:
//!
//! - **Auth capability** ([`AuthApi`]): current session, session-change
//!   notifications, and the sign-up/sign-in/sign-out forwarding calls.
//! - **Data capability** ([`rest::RestClient`]): a generic row-query
//!   interface (equality filters, ordering, limiting, insert/update/delete,
//!   RPC) against named record collections. The auth store only uses it for
//!   the single-row role lookup ([`RoleLookup`]); catalog and orders use it
//!   for their queries.
//!
//! [`HostedBackend`] wires both over one HTTP client and one token store,
//! so row queries are issued with the live session's bearer token and the
//! platform's row-level security applies.

pub mod auth;
pub mod rest;
mod types;

pub use auth::AuthClient;
pub use rest::{QueryBuilder, RestClient};
pub use types::{Credentials, OAuthProvider, Session, SessionChange, SessionEvent, SignUpRequest};

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

use seaglass_core::{Role, UserId};

use crate::config::StorefrontConfig;

/// Errors from the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Auth endpoint rejected the call (bad credentials, weak password, ...).
    /// The platform's description is passed through verbatim.
    #[error("{0}")]
    Auth(String),

    /// A single-row query matched no row.
    #[error("row not found")]
    RowNotFound,

    /// Refusing to run an update or delete with no filters.
    #[error("unfiltered write against collection '{0}'")]
    UnfilteredWrite(String),

    /// Endpoint URL construction failed.
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    /// A request body could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Auth capability surface.
///
/// Implemented by [`HostedBackend`] in production and by in-memory fakes in
/// tests. Sign-in and sign-up do not return the new session: state reaches
/// the stores through the session-change channel, asynchronously.
pub trait AuthApi: Send + Sync {
    /// Resolve the current session, refreshing an expired token if needed.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Subscribe to session-change notifications.
    fn session_changes(&self) -> broadcast::Receiver<SessionChange>;

    /// Register a new account.
    fn sign_up(&self, request: SignUpRequest)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Sign in with email and password.
    fn sign_in_with_password(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Start an OAuth sign-in; returns the URL to send the user to.
    fn sign_in_with_provider(
        &self,
        provider: OAuthProvider,
    ) -> Result<Url, BackendError>;

    /// End the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Single-row role lookup keyed by user id (data capability, `profiles`
/// collection). `Ok(None)` means no profile row exists.
pub trait RoleLookup: Send + Sync {
    fn role_for(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Role>, BackendError>> + Send;
}

// =============================================================================
// Token Store
// =============================================================================

/// Token material for the live session.
#[derive(Debug, Clone)]
pub(crate) struct StoredSession {
    pub session: Session,
    pub access_token: SecretString,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Shared holder for the current session's tokens.
///
/// Written by the auth client, read by the REST client so row queries carry
/// the user's bearer token.
#[derive(Clone, Default)]
pub(crate) struct TokenStore {
    inner: Arc<RwLock<Option<StoredSession>>>,
}

impl TokenStore {
    pub fn set(&self, stored: StoredSession) {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(stored);
    }

    pub fn clear(&self) -> Option<StoredSession> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn get(&self) -> Option<StoredSession> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The bearer token row queries should use, when signed in.
    pub fn access_token(&self) -> Option<SecretString> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}

// =============================================================================
// Hosted Backend
// =============================================================================

/// Production client for the hosted platform: auth endpoints plus the
/// row-query API, sharing one HTTP client and token store.
#[derive(Clone)]
pub struct HostedBackend {
    auth: AuthClient,
    rest: RestClient,
}

impl HostedBackend {
    /// Build a backend client from configuration.
    #[must_use]
    pub fn new(config: &StorefrontConfig) -> Self {
        let http = reqwest::Client::new();
        let tokens = TokenStore::default();
        let (changes, _) = broadcast::channel(16);

        let auth = AuthClient::new(
            http.clone(),
            config.backend_url.clone(),
            config.backend_anon_key.clone(),
            tokens.clone(),
            changes,
        );
        let rest = RestClient::new(
            http,
            config.backend_url.clone(),
            config.backend_anon_key.clone(),
            tokens,
        );

        Self { auth, rest }
    }

    /// The data capability: generic row queries against named collections.
    #[must_use]
    pub const fn rest(&self) -> &RestClient {
        &self.rest
    }
}

impl AuthApi for HostedBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.auth.current_session().await
    }

    fn session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.auth.session_changes()
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<(), BackendError> {
        self.auth.sign_up(request).await
    }

    async fn sign_in_with_password(&self, credentials: Credentials) -> Result<(), BackendError> {
        self.auth.sign_in_with_password(credentials).await
    }

    fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<Url, BackendError> {
        self.auth.sign_in_with_provider(provider)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.auth.sign_out().await
    }
}

impl RoleLookup for HostedBackend {
    async fn role_for(&self, user_id: UserId) -> Result<Option<Role>, BackendError> {
        #[derive(serde::Deserialize)]
        struct ProfileRole {
            role: Role,
        }

        let row: Option<ProfileRole> = self
            .rest
            .collection("profiles")
            .select("role")
            .eq("id", user_id)
            .fetch_optional()
            .await?;

        Ok(row.map(|r| r.role))
    }
}
