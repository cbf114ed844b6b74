//! Integration test support for Seaglass.
//!
//! Provides [`FakeBackend`], an in-memory stand-in for the hosted platform
//! that implements the storefront's capability traits. Tests script it
//! with accounts, roles and failure modes, then drive the stores exactly
//! as the application would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p seaglass-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once, PoisonError};

use secrecy::SecretString;
use tokio::sync::broadcast;
use url::Url;

use seaglass_core::{Email, OrderId, Role, UserId};
use seaglass_storefront::backend::{
    AuthApi, BackendError, Credentials, OAuthProvider, RoleLookup, Session, SessionChange,
    SessionEvent, SignUpRequest,
};
use seaglass_storefront::checkout::{OrderApi, OrderLineInput, ShippingAddress};

/// Install a test tracing subscriber once per process. Respects
/// `RUST_LOG`; output goes through the test writer so it only shows for
/// failing tests.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An order captured by [`FakeBackend::create_order`].
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub items: Vec<OrderLineInput>,
    pub shipping_address: ShippingAddress,
}

/// In-memory backend implementing the storefront capability traits.
///
/// Accounts are keyed by email. Failure modes are toggled through the
/// public atomics.
pub struct FakeBackend {
    accounts: Mutex<HashMap<String, Session>>,
    current: Mutex<Option<Session>>,
    roles: Mutex<HashMap<UserId, Role>>,
    orders: Mutex<Vec<PlacedOrder>>,
    changes: broadcast::Sender<SessionChange>,

    /// Make `role_for` return an error (fail-closed paths).
    pub role_lookup_fails: AtomicBool,
    /// Make `create_order` return an error.
    pub order_fails: AtomicBool,
    /// Make password sign-in fail as if credentials were wrong.
    pub rejects_passwords: AtomicBool,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            roles: Mutex::new(HashMap::new()),
            orders: Mutex::new(Vec::new()),
            changes,
            role_lookup_fails: AtomicBool::new(false),
            order_fails: AtomicBool::new(false),
            rejects_passwords: AtomicBool::new(false),
        }
    }

    /// Register an account with a role, returning its user id.
    pub fn add_account(&self, email: &Email, role: Role) -> UserId {
        let user_id = UserId::generate();
        let session = Session {
            user_id,
            email: email.clone(),
            display_name: None,
            avatar_url: None,
            metadata: serde_json::Value::Null,
        };
        lock(&self.accounts)
            .insert(email.as_str().to_owned(), session);
        lock(&self.roles).insert(user_id, role);
        user_id
    }

    /// Make an account's session the persisted one, as if it survived a
    /// previous run.
    pub fn persist_session(&self, email: &Email) {
        let session = lock(&self.accounts).get(email.as_str()).cloned();
        *lock(&self.current) = session;
    }

    /// Push a session change onto the broadcast channel.
    pub fn emit(&self, event: SessionEvent, session: Option<Session>) {
        let _ = self.changes.send(SessionChange { event, session });
    }

    /// Orders captured so far.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<PlacedOrder> {
        lock(&self.orders).clone()
    }

    #[must_use]
    pub fn current_session_sync(&self) -> Option<Session> {
        lock(&self.current).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthApi for FakeBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.current_session_sync())
    }

    fn session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<(), BackendError> {
        let user_id = UserId::generate();
        let session = Session {
            user_id,
            email: request.email.clone(),
            display_name: request.full_name.clone(),
            avatar_url: request.avatar_url.clone(),
            metadata: serde_json::Value::Null,
        };
        lock(&self.accounts)
            .insert(request.email.as_str().to_owned(), session.clone());
        *lock(&self.current) = Some(session.clone());
        self.emit(SessionEvent::SignedIn, Some(session));
        Ok(())
    }

    async fn sign_in_with_password(&self, credentials: Credentials) -> Result<(), BackendError> {
        if self.rejects_passwords.load(Ordering::SeqCst) {
            return Err(BackendError::Auth("Invalid login credentials".to_owned()));
        }
        let session = lock(&self.accounts)
            .get(credentials.email.as_str())
            .cloned()
            .ok_or_else(|| BackendError::Auth("Invalid login credentials".to_owned()))?;
        *lock(&self.current) = Some(session.clone());
        self.emit(SessionEvent::SignedIn, Some(session));
        Ok(())
    }

    fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<Url, BackendError> {
        Ok(Url::parse(&format!(
            "https://auth.example.com/authorize?provider={provider}"
        ))?)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        *lock(&self.current) = None;
        self.emit(SessionEvent::SignedOut, None);
        Ok(())
    }
}

impl RoleLookup for FakeBackend {
    async fn role_for(&self, user_id: UserId) -> Result<Option<Role>, BackendError> {
        if self.role_lookup_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Auth("profiles lookup failed".to_owned()));
        }
        Ok(lock(&self.roles).get(&user_id).copied())
    }
}

impl OrderApi for FakeBackend {
    async fn create_order(
        &self,
        items: &[OrderLineInput],
        shipping_address: &ShippingAddress,
    ) -> Result<OrderId, BackendError> {
        if self.order_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Auth("stock check failed".to_owned()));
        }
        let id = OrderId::generate();
        lock(&self.orders).push(PlacedOrder {
            id,
            items: items.to_vec(),
            shipping_address: shipping_address.clone(),
        });
        Ok(id)
    }
}

/// Credentials helper for tests.
#[must_use]
pub fn credentials(email: &Email, password: &str) -> Credentials {
    Credentials {
        email: email.clone(),
        password: SecretString::from(password),
    }
}
