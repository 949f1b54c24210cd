//! Coordinator fallback behavior across tier outages.
//!
//! Exercises the read/write policies end to end: primary-first reads for
//! signed-in shoppers, local fallback on unavailability and timeouts,
//! degraded writes, and cap enforcement on the local tier.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;

use cartsync_core::{Cart, CartItem, derive_totals, upsert};
use cartsync_engine::Tier;
use cartsync_engine::store::{LocalMedium, MemoryMedium, PrimaryBackend, PrimaryCartStore};

use cartsync_integration_tests::{
    FlakyBackend, HangingBackend, anonymous, coordinator_with, draft, fresh_session, fresh_user,
    signed_in, test_config,
};

fn items_from_drafts(drafts: &[(&str, i64)]) -> Vec<CartItem> {
    let now = Utc::now();
    let mut items = Vec::new();
    for (product_id, quantity) in drafts {
        items = upsert(items, draft(product_id, *quantity), now);
    }
    items
}

// =============================================================================
// Read Fallback
// =============================================================================

/// Scenario: empty local cart, primary cart holds [X: qty 2]. A signed-in
/// read returns the primary cart with `source: primary`.
#[tokio::test]
async fn test_signed_in_read_prefers_primary() {
    let backend = Arc::new(FlakyBackend::new());
    let medium = Arc::new(MemoryMedium::new());
    let identity = signed_in(&fresh_user());

    // Seed the primary tier only; the local medium stays empty.
    let primary = PrimaryCartStore::new(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        &test_config(),
    );
    primary
        .set(&identity, items_from_drafts(&[("x", 2)]), None)
        .await
        .unwrap();

    let coordinator = coordinator_with(backend, medium);
    let read = coordinator.get_cart(&identity).await.unwrap();

    assert_eq!(read.source, Tier::Primary);
    assert_eq!(read.cart.items.len(), 1);
    assert_eq!(read.cart.items[0].product_id, "x");
    assert_eq!(read.cart.items[0].quantity, 2);
}

/// Scenario: the primary tier times out on get. The coordinator falls back
/// to the local tier and returns its contents with `source: local`.
#[tokio::test]
async fn test_primary_timeout_falls_back_to_local() {
    let medium = Arc::new(MemoryMedium::new());
    let identity = signed_in(&fresh_user());

    // Seed the local tier through a healthy coordinator first.
    let seeder = coordinator_with(Arc::new(FlakyBackend::new()), Arc::clone(&medium));
    seeder.add_item(&identity, draft("x", 2)).await.unwrap();

    // Same medium, but a primary tier that never answers.
    let coordinator = coordinator_with(Arc::new(HangingBackend), medium);
    let read = coordinator.get_cart(&identity).await.unwrap();

    assert_eq!(read.source, Tier::Local);
    assert_eq!(read.cart.item_count, 2);
}

/// A primary not-found still consults the local tier: an unmerged cart from
/// a prior anonymous session (or an outage window) must not be invisible.
#[tokio::test]
async fn test_primary_not_found_still_checks_local() {
    let backend = Arc::new(FlakyBackend::new());
    let medium = Arc::new(MemoryMedium::new());

    // An anonymous session leaves a cart on the local tier.
    let session = fresh_session();
    let coordinator = coordinator_with(Arc::clone(&backend) as Arc<dyn PrimaryBackend>, Arc::clone(&medium));
    coordinator
        .add_item(&anonymous(&session), draft("x", 1))
        .await
        .unwrap();

    // The signed-in read finds nothing in primary but the local cart exists.
    let read = coordinator.get_cart(&signed_in(&fresh_user())).await.unwrap();
    assert_eq!(read.source, Tier::Local);
    assert_eq!(read.cart.item_count, 1);
}

// =============================================================================
// Write Fallback
// =============================================================================

/// While the primary tier is down, writes still succeed against the local
/// tier and are flagged as degraded - a soft warning, never a failure.
#[tokio::test]
async fn test_unavailable_primary_degrades_write() {
    let backend = Arc::new(FlakyBackend::new());
    let medium = Arc::new(MemoryMedium::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::clone(&medium),
    );
    let identity = signed_in(&fresh_user());

    backend.set_down(true);
    let write = coordinator
        .update_cart(&identity, vec![draft("x", 2)])
        .await
        .unwrap();

    assert_eq!(write.source, Tier::Local);
    assert!(write.primary_degraded);
    assert_eq!(write.cart.item_count, 2);

    // Once the tier recovers, writes land on primary again, undegraded.
    backend.set_down(false);
    let write = coordinator
        .update_cart(&identity, vec![draft("x", 3)])
        .await
        .unwrap();
    assert_eq!(write.source, Tier::Primary);
    assert!(!write.primary_degraded);
}

/// Totals are recomputed on every mutation and every stored quantity stays
/// positive, whichever tier served the write.
#[tokio::test]
async fn test_totals_recomputed_after_every_mutation() {
    let backend = Arc::new(FlakyBackend::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::new(MemoryMedium::new()),
    );
    let identity = signed_in(&fresh_user());

    for (product, quantity) in [("a", 2_i64), ("b", 1), ("a", 5), ("c", 3)] {
        let write = coordinator
            .add_item(&identity, draft(product, quantity))
            .await
            .unwrap();

        let expected = derive_totals(&write.cart.items);
        assert_eq!(write.cart.total, expected.total);
        assert_eq!(write.cart.item_count, expected.item_count);
        assert!(write.cart.items.iter().all(|item| item.quantity > 0));
    }
}

/// Scenario: adding an item with quantity 0 for a key already in the cart
/// removes the item and reports success, not an error.
#[tokio::test]
async fn test_zero_quantity_add_removes_item() {
    let coordinator = coordinator_with(Arc::new(FlakyBackend::new()), Arc::new(MemoryMedium::new()));
    let session = fresh_session();
    let identity = anonymous(&session);

    coordinator.add_item(&identity, draft("x", 2)).await.unwrap();
    let write = coordinator.add_item(&identity, draft("x", 0)).await.unwrap();

    assert!(write.rejected.is_empty());
    assert!(write.cart.is_empty());
}

// =============================================================================
// Item Cap
// =============================================================================

/// Scenario: the local tier holds 51 items and a 52nd is added with cap 50.
/// The write succeeds, the result holds exactly 50 items, and the oldest
/// item (by `created_at`) is gone.
#[tokio::test]
async fn test_local_cap_truncates_oldest_first() {
    let medium = Arc::new(MemoryMedium::new());
    let session = fresh_session();
    let identity = anonymous(&session);

    // Seed 51 items directly onto the medium, bypassing the store's cap.
    let base = Utc::now() - TimeDelta::hours(1);
    let items: Vec<CartItem> = (0..51)
        .map(|i| CartItem {
            product_id: format!("p{i}"),
            variant_key: 0,
            size: "M".to_string(),
            unit_price: Decimal::new(1000, 2),
            quantity: 1,
            available_stock: None,
            created_at: base + TimeDelta::seconds(i),
            updated_at: base + TimeDelta::seconds(i),
        })
        .collect();
    let totals = derive_totals(&items);
    let seeded = Cart {
        identity: identity.clone(),
        items,
        total: totals.total,
        item_count: totals.item_count,
        created_at: base,
        updated_at: base,
        expires_at: None,
    };
    medium
        .write("cartsync.cart", serde_json::to_vec(&seeded).unwrap())
        .await
        .unwrap();

    let coordinator = coordinator_with(Arc::new(FlakyBackend::new()), medium);
    let write = coordinator.add_item(&identity, draft("p-new", 1)).await.unwrap();

    assert!(write.rejected.is_empty(), "truncation is a successful write");
    assert_eq!(write.cart.items.len(), 50);
    assert!(
        write.cart.items.iter().all(|item| item.product_id != "p0"),
        "oldest item must be dropped first"
    );
    assert!(
        write.cart.items.iter().any(|item| item.product_id == "p-new"),
        "the new item survives the cap"
    );
}

// =============================================================================
// Composite Key Uniqueness
// =============================================================================

/// No two items in the same cart ever share a composite key, regardless of
/// how many times the same key is added.
#[tokio::test]
async fn test_no_duplicate_composite_keys_after_adds() {
    let coordinator = coordinator_with(Arc::new(FlakyBackend::new()), Arc::new(MemoryMedium::new()));
    let identity = signed_in(&fresh_user());

    for quantity in 1..=4 {
        coordinator.add_item(&identity, draft("x", quantity)).await.unwrap();
    }
    coordinator.add_item(&identity, draft("y", 1)).await.unwrap();

    let read = coordinator.get_cart(&identity).await.unwrap();
    let mut keys: Vec<String> = read.cart.items.iter().map(|i| i.key().to_string()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), read.cart.items.len());
    assert_eq!(read.cart.items.len(), 2);
}
