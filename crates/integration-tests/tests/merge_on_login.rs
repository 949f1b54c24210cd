//! Login-boundary merge behavior.
//!
//! Covers promotion, union with local precedence, idempotence across
//! repeated merges, outage handling, and serialization of concurrent logins
//! for the same user.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;

use cartsync_core::{CartItemDraft, upsert};
use cartsync_engine::store::{LocalMedium, MemoryMedium, PrimaryBackend, PrimaryCartStore};
use cartsync_engine::{CartError, Tier};

use cartsync_integration_tests::{
    FlakyBackend, anonymous, coordinator_with, draft, fresh_session, fresh_user, signed_in,
    test_config,
};

/// Wire up a backend/medium pair and seed the user's primary cart.
async fn seed_primary(backend: &Arc<FlakyBackend>, user: &cartsync_core::UserId, drafts: &[(&str, i64)]) {
    let primary = PrimaryCartStore::new(
        Arc::clone(backend) as Arc<dyn PrimaryBackend>,
        &test_config(),
    );
    let now = chrono::Utc::now();
    let mut items = Vec::new();
    for (product_id, quantity) in drafts {
        items = upsert(items, draft(product_id, *quantity), now);
    }
    primary.set(&signed_in(user), items, None).await.unwrap();
}

/// Scenario: local [X: qty 3], primary [X: qty 1, Y: qty 2]. The merge
/// yields [X: qty 3, Y: qty 2] with totals recomputed, and the local entry
/// is cleared.
#[tokio::test]
async fn test_merge_unions_with_local_precedence() {
    let backend = Arc::new(FlakyBackend::new());
    let medium = Arc::new(MemoryMedium::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::clone(&medium),
    );

    let user = fresh_user();
    let session = fresh_session();

    coordinator
        .add_item(&anonymous(&session), draft("x", 3))
        .await
        .unwrap();
    seed_primary(&backend, &user, &[("x", 1), ("y", 2)]).await;

    let write = coordinator.merge_on_login(&user, &session).await.unwrap();

    assert_eq!(write.source, Tier::Primary);
    assert_eq!(write.cart.items.len(), 2);

    let x = write.cart.items.iter().find(|i| i.product_id == "x").unwrap();
    let y = write.cart.items.iter().find(|i| i.product_id == "y").unwrap();
    assert_eq!(x.quantity, 3, "local (pre-login) quantity wins the conflict");
    assert_eq!(y.quantity, 2, "primary-only key carried through unchanged");

    assert_eq!(write.cart.item_count, 5);
    assert_eq!(write.cart.total, Decimal::new(5000, 2)); // 5 x 10.00

    // The anonymous entry must not survive the merge.
    assert!(medium.read("cartsync.cart").await.unwrap().is_none());
}

/// With no local cart, the primary cart is the active cart unchanged.
#[tokio::test]
async fn test_merge_without_local_is_noop() {
    let backend = Arc::new(FlakyBackend::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::new(MemoryMedium::new()),
    );

    let user = fresh_user();
    seed_primary(&backend, &user, &[("x", 2)]).await;

    let write = coordinator.merge_on_login(&user, &fresh_session()).await.unwrap();
    assert_eq!(write.cart.items.len(), 1);
    assert_eq!(write.cart.item_count, 2);
}

/// With no primary cart, the local cart is promoted under the user id and
/// served from the primary tier afterwards.
#[tokio::test]
async fn test_merge_promotes_local_when_primary_absent() {
    let backend = Arc::new(FlakyBackend::new());
    let medium = Arc::new(MemoryMedium::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::clone(&medium),
    );

    let user = fresh_user();
    let session = fresh_session();
    coordinator
        .add_item(&anonymous(&session), draft("x", 2))
        .await
        .unwrap();

    let write = coordinator.merge_on_login(&user, &session).await.unwrap();
    assert_eq!(write.cart.item_count, 2);

    let read = coordinator.get_cart(&signed_in(&user)).await.unwrap();
    assert_eq!(read.source, Tier::Primary);
    assert_eq!(read.cart.item_count, 2);
}

/// merge(merge(A, B)) == merge(A, B): once the local entry is cleared, a
/// repeated login merge is a no-op.
#[tokio::test]
async fn test_merge_is_idempotent() {
    let backend = Arc::new(FlakyBackend::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::new(MemoryMedium::new()),
    );

    let user = fresh_user();
    let session = fresh_session();
    coordinator
        .add_item(&anonymous(&session), draft("x", 3))
        .await
        .unwrap();
    seed_primary(&backend, &user, &[("x", 1), ("y", 2)]).await;

    let first = coordinator.merge_on_login(&user, &session).await.unwrap();
    let second = coordinator.merge_on_login(&user, &session).await.unwrap();

    assert_eq!(first.cart.items.len(), second.cart.items.len());
    assert_eq!(first.cart.item_count, second.cart.item_count);
    assert_eq!(first.cart.total, second.cart.total);
}

/// A merge against an unavailable primary tier fails cleanly and leaves the
/// local cart intact for a retry.
#[tokio::test]
async fn test_merge_with_primary_down_preserves_local() {
    let backend = Arc::new(FlakyBackend::new());
    let medium = Arc::new(MemoryMedium::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::clone(&medium),
    );

    let user = fresh_user();
    let session = fresh_session();
    coordinator
        .add_item(&anonymous(&session), draft("x", 2))
        .await
        .unwrap();

    backend.set_down(true);
    let err = coordinator.merge_on_login(&user, &session).await.unwrap_err();
    assert!(matches!(err, CartError::Unavailable(_)));

    // Local cart untouched; the retry succeeds once the tier recovers.
    assert!(medium.read("cartsync.cart").await.unwrap().is_some());

    backend.set_down(false);
    let write = coordinator.merge_on_login(&user, &session).await.unwrap();
    assert_eq!(write.cart.item_count, 2);
}

/// Two concurrent logins for the same user are serialized by the in-flight
/// guard: both complete, and the merged cart is not applied twice.
#[tokio::test]
async fn test_concurrent_logins_are_serialized() {
    let backend = Arc::new(FlakyBackend::new());
    let coordinator = coordinator_with(
        Arc::clone(&backend) as Arc<dyn PrimaryBackend>,
        Arc::new(MemoryMedium::new()),
    );

    let user = fresh_user();
    let session = fresh_session();
    coordinator
        .add_item(&anonymous(&session), draft("x", 3))
        .await
        .unwrap();
    seed_primary(&backend, &user, &[("x", 1), ("y", 2)]).await;

    let (first, second) = tokio::join!(
        coordinator.merge_on_login(&user, &session),
        coordinator.merge_on_login(&user, &session),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    // Whichever ran second saw no local cart; both report the merged state.
    for write in [&first, &second] {
        assert_eq!(write.cart.items.len(), 2);
        assert_eq!(write.cart.item_count, 5);
    }

    let read = coordinator.get_cart(&signed_in(&user)).await.unwrap();
    assert_eq!(read.cart.item_count, 5, "merge must not be applied twice");
}
