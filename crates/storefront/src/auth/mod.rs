//! Authentication store.
//!
//! Tracks who is signed in and whether they are an admin, derived entirely
//! from the backend's session-change channel plus one role lookup per
//! sign-in. The store starts in a loading state so the UI can defer
//! account-dependent rendering until the persisted session (if any) has
//! been resolved.
//!
//! Admin status here is a display hint. Every privileged operation is
//! enforced by the backend's row policies regardless of what this store
//! believes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use url::Url;

use crate::backend::{
    AuthApi, BackendError, Credentials, OAuthProvider, RoleLookup, Session, SessionChange,
    SessionEvent, SignUpRequest,
};
use crate::observe::{ListenerSet, Subscription};

/// Auth store snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// The signed-in user, if any.
    pub session: Option<Session>,
    /// Whether the signed-in user's profile carries the admin role.
    /// Always `false` while signed out, and on any lookup failure.
    pub is_admin: bool,
    /// `true` until the first session resolution completes.
    pub loading: bool,
}

impl AuthState {
    const fn loading() -> Self {
        Self {
            session: None,
            is_admin: false,
            loading: true,
        }
    }

    const fn signed_out() -> Self {
        Self {
            session: None,
            is_admin: false,
            loading: false,
        }
    }

    /// Collapse the snapshot into the three states the UI branches on.
    #[must_use]
    pub const fn stage(&self) -> AuthStage {
        if self.loading {
            AuthStage::Loading
        } else if self.session.is_some() {
            AuthStage::SignedIn {
                admin: self.is_admin,
            }
        } else {
            AuthStage::SignedOut
        }
    }
}

/// The three states a screen cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Loading,
    SignedOut,
    SignedIn { admin: bool },
}

struct AuthShared<B> {
    backend: B,
    state: RwLock<AuthState>,
    listeners: ListenerSet<AuthState>,
}

impl<B: AuthApi + RoleLookup> AuthShared<B> {
    fn snapshot(&self) -> AuthState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the state and notify listeners with the new snapshot.
    fn replace(&self, next: AuthState) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == next {
                return;
            }
            *state = next.clone();
        }
        self.listeners.notify(&next);
    }

    /// Replace the state only if it is still the initial loading state.
    ///
    /// The startup resolution races the watcher: an event applied between
    /// subscribing and the session lookup resolving must not be clobbered
    /// by the stale lookup result.
    fn replace_if_loading(&self, next: AuthState) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if !state.loading {
                return;
            }
            *state = next.clone();
        }
        self.listeners.notify(&next);
    }

    /// Look up the session user's role. Fails closed: any error or a
    /// missing profile row means not an admin.
    async fn resolve_admin(&self, session: &Session) -> bool {
        match self.backend.role_for(session.user_id).await {
            Ok(Some(role)) => role.is_admin(),
            Ok(None) => {
                tracing::warn!(user_id = %session.user_id, "no profile row for user, assuming non-admin");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "role lookup failed, assuming non-admin");
                false
            }
        }
    }

    /// Apply one session-change event. The admin role is re-resolved on
    /// every event that carries a session, so a role change takes effect
    /// at the next sign-in or token refresh.
    async fn apply(&self, change: SessionChange) {
        match (change.event, change.session) {
            (SessionEvent::SignedIn | SessionEvent::TokenRefreshed, Some(session)) => {
                let is_admin = self.resolve_admin(&session).await;
                self.replace(AuthState {
                    session: Some(session),
                    is_admin,
                    loading: false,
                });
            }
            (SessionEvent::SignedOut, _) | (_, None) => {
                self.replace(AuthState::signed_out());
            }
        }
    }
}

/// The authentication store.
///
/// Generic over the backend capability traits so tests can drive it with
/// an in-memory fake.
pub struct AuthStore<B: AuthApi + RoleLookup + 'static> {
    shared: Arc<AuthShared<B>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
}

impl<B: AuthApi + RoleLookup + 'static> AuthStore<B> {
    /// Create the store in the loading state. Call [`Self::initialize`] to
    /// resolve the persisted session and start watching for changes.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            shared: Arc::new(AuthShared {
                backend,
                state: RwLock::new(AuthState::loading()),
                listeners: ListenerSet::default(),
            }),
            watcher: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Resolve the persisted session and start the session-change watcher.
    ///
    /// Idempotent: later calls are no-ops. A failed session resolution is
    /// logged and lands in the signed-out state rather than erroring, so a
    /// flaky network at startup degrades to "not signed in".
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        // Subscribe before resolving so changes racing the initial lookup
        // are not lost.
        let changes = self.shared.backend.session_changes();

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let mut changes = changes;
            loop {
                match changes.recv().await {
                    Ok(change) => shared.apply(change).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "session change watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        match self.shared.backend.current_session().await {
            Ok(Some(session)) => {
                let is_admin = self.shared.resolve_admin(&session).await;
                self.shared.replace_if_loading(AuthState {
                    session: Some(session),
                    is_admin,
                    loading: false,
                });
            }
            Ok(None) => self.shared.replace_if_loading(AuthState::signed_out()),
            Err(e) => {
                tracing::warn!(error = %e, "initial session resolution failed");
                self.shared.replace_if_loading(AuthState::signed_out());
            }
        }
    }

    /// Register a new account. State changes arrive via the watcher.
    ///
    /// # Errors
    ///
    /// Propagates the backend's rejection verbatim.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<(), BackendError> {
        self.shared.backend.sign_up(request).await
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Propagates the backend's rejection verbatim.
    pub async fn sign_in_with_password(
        &self,
        credentials: Credentials,
    ) -> Result<(), BackendError> {
        self.shared.backend.sign_in_with_password(credentials).await
    }

    /// Start an OAuth sign-in; the caller navigates to the returned URL.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Url` if the hand-off URL cannot be built.
    pub fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<Url, BackendError> {
        self.shared.backend.sign_in_with_provider(provider)
    }

    /// Sign out. Local state clears immediately via the watcher even if
    /// the backend call fails.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the revocation call.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.shared.backend.sign_out().await
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.shared.snapshot()
    }

    /// The signed-in session, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.shared.snapshot().session
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.shared.snapshot().is_admin
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.snapshot().loading
    }

    /// Register a listener invoked synchronously on every state change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&AuthState) + Send + Sync + 'static,
    ) -> Subscription<AuthState> {
        self.shared.listeners.subscribe(listener)
    }

    /// Stop the session-change watcher. Called automatically on drop.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl<B: AuthApi + RoleLookup + 'static> Drop for AuthStore<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
