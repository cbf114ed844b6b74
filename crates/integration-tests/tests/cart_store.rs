//! Integration tests for the cart store.
//!
//! These cover the behaviors a shopper relies on across a session:
//! merging, derived totals, and persistence surviving an application
//! restart.

use chrono::Utc;
use seaglass_core::{Price, ProductId};
use seaglass_integration_tests::init_tracing;
use seaglass_storefront::cart::{CART_KEY, CartStorage, CartStore, FileStorage, MemoryStorage};
use seaglass_storefront::catalog::Product;

fn product(name: &str, cents: i64, stock: u32) -> Product {
    Product {
        id: ProductId::generate(),
        name: name.to_owned(),
        description: None,
        price: Price::from_cents(cents),
        stock,
        images: vec![format!("https://img.example.com/{name}.jpg")],
        category_id: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Derived Values
// =============================================================================

#[test]
fn test_badge_count_tracks_quantities_across_products() {
    init_tracing();
    let cart = CartStore::new(Box::new(MemoryStorage::default()));

    let pendant = product("pendant", 2450, 10);
    let frame = product("frame", 1000, 5);

    cart.add_item(&pendant, 1);
    cart.add_item(&frame, 2);
    cart.add_item(&pendant, 1); // merges into the existing line

    assert_eq!(cart.count(), 4);
    assert_eq!(cart.state().lines().len(), 2);
    assert_eq!(cart.subtotal(), Price::from_cents(2 * 2450 + 2 * 1000));
}

#[test]
fn test_quantity_stepper_semantics() {
    init_tracing();
    let cart = CartStore::new(Box::new(MemoryStorage::default()));
    let pendant = product("pendant", 2450, 10);
    cart.add_item(&pendant, 1);

    // Stepper sets absolute quantities.
    cart.set_quantity(pendant.id, 3);
    assert_eq!(cart.count(), 3);

    // Stepping down to zero removes the line entirely.
    cart.set_quantity(pendant.id, 0);
    assert!(cart.state().is_empty());
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_cart_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pendant = product("pendant", 2450, 10);

    {
        let cart = CartStore::new(Box::new(FileStorage::new(dir.path())));
        cart.add_item(&pendant, 2);
    }

    // A fresh store over the same directory sees the same cart.
    let cart = CartStore::new(Box::new(FileStorage::new(dir.path())));
    assert_eq!(cart.count(), 2);
    let state = cart.state();
    let line = state.line(pendant.id).unwrap();
    assert_eq!(line.name, "pendant");
    assert_eq!(line.unit_price, Price::from_cents(2450));
}

#[test]
fn test_clear_persists_the_empty_cart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    {
        let cart = CartStore::new(Box::new(FileStorage::new(dir.path())));
        cart.add_item(&product("pendant", 2450, 10), 2);
        cart.clear();
    }

    let cart = CartStore::new(Box::new(FileStorage::new(dir.path())));
    assert!(cart.state().is_empty());
}

#[test]
fn test_corrupt_persisted_cart_falls_back_to_empty() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    storage.save(CART_KEY, "definitely not json").unwrap();

    let cart = CartStore::new(Box::new(storage));
    assert!(cart.state().is_empty());

    // The store stays usable and overwrites the bad data.
    cart.add_item(&product("pendant", 2450, 10), 1);
    let reloaded = CartStore::new(Box::new(FileStorage::new(dir.path())));
    assert_eq!(reloaded.count(), 1);
}

// =============================================================================
// Notifications
// =============================================================================

#[test]
fn test_every_mutation_notifies_subscribers() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    init_tracing();
    let cart = CartStore::new(Box::new(MemoryStorage::default()));
    let notifications = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&notifications);
    let _sub = cart.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let pendant = product("pendant", 2450, 10);
    cart.add_item(&pendant, 1); // 1
    cart.set_quantity(pendant.id, 4); // 2
    cart.remove_item(pendant.id); // 3
    cart.clear(); // 4

    assert_eq!(notifications.load(Ordering::SeqCst), 4);
}
