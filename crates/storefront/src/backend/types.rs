//! Wire and capability types for the hosted backend.

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use seaglass_core::{Email, UserId};

/// An authenticated identity, as the stores see it.
///
/// Token material stays inside the backend client; the stores only ever
/// hold this identity view. Absence of a `Session` means signed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Backend user id.
    pub user_id: UserId,
    /// Sign-in email.
    pub email: Email,
    /// Display name from the profile metadata, when set.
    pub display_name: Option<String>,
    /// Avatar image URL from the profile metadata, when set.
    pub avatar_url: Option<String>,
    /// Raw user metadata as the platform returned it.
    pub metadata: Value,
}

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user signed in (password, sign-up confirmation, or OAuth return).
    SignedIn,
    /// The session ended.
    SignedOut,
    /// The access token was refreshed; the identity is unchanged.
    TokenRefreshed,
}

/// A session-change notification delivered on the backend's broadcast
/// channel. `session` is `None` exactly for [`SessionEvent::SignedOut`].
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

/// Password sign-in credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

/// Sign-up request with the profile metadata the storefront collects.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: Email,
    pub password: SecretString,
    /// Stored as `full_name` in the user metadata.
    pub full_name: Option<String>,
    /// Stored as `avatar_url` in the user metadata.
    pub avatar_url: Option<String>,
}

/// Third-party OAuth providers the platform can delegate sign-in to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
    Apple,
}

impl OAuthProvider {
    /// Provider name as the authorize endpoint expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Apple => "apple",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Wire Shapes
// =============================================================================

/// Token grant response from the auth endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: WireUser,
}

/// User object as the auth endpoints return it.
#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub user_metadata: Value,
}

impl From<WireUser> for Session {
    fn from(user: WireUser) -> Self {
        let display_name = user
            .user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let avatar_url = user
            .user_metadata
            .get("avatar_url")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self {
            user_id: user.id,
            email: user.email,
            display_name,
            avatar_url,
            metadata: user.user_metadata,
        }
    }
}

/// Error body returned by the auth endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthErrorBody {
    #[serde(alias = "msg", alias = "message")]
    pub error_description: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_wire_user_extracts_metadata() {
        let user: WireUser = serde_json::from_value(serde_json::json!({
            "id": "7f2c1a77-31f1-4d0c-8ab9-60a94e3c11d2",
            "email": "shopper@example.com",
            "user_metadata": {
                "full_name": "Sam Shopper",
                "avatar_url": "https://avatars.example.com/sam"
            }
        }))
        .unwrap();

        let session = Session::from(user);
        assert_eq!(session.email.as_str(), "shopper@example.com");
        assert_eq!(session.display_name.as_deref(), Some("Sam Shopper"));
        assert_eq!(
            session.avatar_url.as_deref(),
            Some("https://avatars.example.com/sam")
        );
    }

    #[test]
    fn test_session_from_wire_user_without_metadata() {
        let user: WireUser = serde_json::from_value(serde_json::json!({
            "id": "7f2c1a77-31f1-4d0c-8ab9-60a94e3c11d2",
            "email": "shopper@example.com"
        }))
        .unwrap();

        let session = Session::from(user);
        assert_eq!(session.display_name, None);
        assert_eq!(session.avatar_url, None);
    }
}
