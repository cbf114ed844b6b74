//! Integration tests for the auth store against the fake backend.
//!
//! These exercise the full lifecycle the application sees: startup with
//! and without a persisted session, password sign-in and sign-out flowing
//! through the session-change channel, and admin resolution failing
//! closed.

use std::sync::atomic::Ordering;

use seaglass_core::{Email, Role};
use seaglass_integration_tests::{FakeBackend, credentials, init_tracing};
use seaglass_storefront::auth::{AuthStage, AuthStore};
use seaglass_storefront::backend::{AuthApi, OAuthProvider, RoleLookup};

fn email(addr: &str) -> Email {
    addr.parse().unwrap()
}

/// Poll the store until the predicate holds; the watcher applies changes
/// on a spawned task.
async fn settle<B, F>(store: &AuthStore<B>, pred: F)
where
    B: AuthApi + RoleLookup + 'static,
    F: Fn(&seaglass_storefront::auth::AuthState) -> bool,
{
    for _ in 0..200 {
        if pred(&store.state()) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("auth store never settled: {:?}", store.state());
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn test_cold_start_without_session() {
    init_tracing();
    let store = AuthStore::new(FakeBackend::new());

    assert_eq!(store.state().stage(), AuthStage::Loading);
    store.initialize().await;
    assert_eq!(store.state().stage(), AuthStage::SignedOut);
}

#[tokio::test]
async fn test_persisted_session_restores_identity_and_role() {
    init_tracing();
    let backend = FakeBackend::new();
    let shopper = email("admin@seaglass.store");
    backend.add_account(&shopper, Role::Admin);
    backend.persist_session(&shopper);

    let store = AuthStore::new(backend);
    store.initialize().await;

    assert_eq!(store.state().stage(), AuthStage::SignedIn { admin: true });
    assert_eq!(store.session().unwrap().email, shopper);
}

// =============================================================================
// Sign-in / Sign-out Lifecycle
// =============================================================================

#[tokio::test]
async fn test_password_sign_in_then_sign_out() {
    init_tracing();
    let backend = FakeBackend::new();
    let shopper = email("shopper@example.com");
    backend.add_account(&shopper, Role::Customer);

    let store = AuthStore::new(backend);
    store.initialize().await;
    assert_eq!(store.state().stage(), AuthStage::SignedOut);

    store
        .sign_in_with_password(credentials(&shopper, "hunter2hunter2"))
        .await
        .unwrap();
    settle(&store, |s| s.session.is_some()).await;
    assert_eq!(store.state().stage(), AuthStage::SignedIn { admin: false });

    store.sign_out().await.unwrap();
    settle(&store, |s| s.session.is_none()).await;
    assert_eq!(store.state().stage(), AuthStage::SignedOut);
    assert!(!store.is_admin());
}

#[tokio::test]
async fn test_rejected_password_leaves_store_signed_out() {
    init_tracing();
    let backend = FakeBackend::new();
    let shopper = email("shopper@example.com");
    backend.add_account(&shopper, Role::Customer);
    backend.rejects_passwords.store(true, Ordering::SeqCst);

    let store = AuthStore::new(backend);
    store.initialize().await;

    let err = store
        .sign_in_with_password(credentials(&shopper, "wrong"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid login credentials"));
    assert_eq!(store.state().stage(), AuthStage::SignedOut);
}

#[tokio::test]
async fn test_sign_up_signs_the_new_account_in() {
    use secrecy::SecretString;
    use seaglass_storefront::backend::SignUpRequest;

    init_tracing();
    let store = AuthStore::new(FakeBackend::new());
    store.initialize().await;

    store
        .sign_up(SignUpRequest {
            email: email("new@example.com"),
            password: SecretString::from("hunter2hunter2"),
            full_name: Some("New Shopper".to_owned()),
            avatar_url: None,
        })
        .await
        .unwrap();

    settle(&store, |s| s.session.is_some()).await;
    let session = store.session().unwrap();
    assert_eq!(session.display_name.as_deref(), Some("New Shopper"));
    // A brand-new account has no profile role yet.
    assert!(!store.is_admin());
}

#[tokio::test]
async fn test_oauth_sign_in_yields_provider_url() {
    init_tracing();
    let store = AuthStore::new(FakeBackend::new());
    store.initialize().await;

    let url = store.sign_in_with_provider(OAuthProvider::Google).unwrap();
    assert_eq!(url.query(), Some("provider=google"));
}

// =============================================================================
// Admin Resolution
// =============================================================================

#[tokio::test]
async fn test_role_lookup_failure_never_grants_admin() {
    init_tracing();
    let backend = FakeBackend::new();
    let boss = email("admin@seaglass.store");
    backend.add_account(&boss, Role::Admin);
    backend.persist_session(&boss);
    backend.role_lookup_fails.store(true, Ordering::SeqCst);

    let store = AuthStore::new(backend);
    store.initialize().await;

    // Signed in, but admin status fails closed.
    assert_eq!(store.state().stage(), AuthStage::SignedIn { admin: false });
}

#[tokio::test]
async fn test_customer_role_is_not_admin() {
    init_tracing();
    let backend = FakeBackend::new();
    let shopper = email("shopper@example.com");
    backend.add_account(&shopper, Role::Customer);
    backend.persist_session(&shopper);

    let store = AuthStore::new(backend);
    store.initialize().await;

    assert!(store.session().is_some());
    assert!(!store.is_admin());
}
