//! Out-of-order responses, driven through a backend the test answers by hand.

mod common;

use common::{line, pid, product, signed_in, snapshot, Call, GatedBackend, Harness, Pending, Reply};
use storefront_core::{CartLine, CartState, SyncStatus};
use storefront_sync::{BackendError, CartSync, SyncResult};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

type Spawned = JoinHandle<SyncResult<CartState>>;

async fn hydrated(lines: Vec<CartLine>) -> (Harness<GatedBackend>, UnboundedReceiver<Pending>) {
    let (backend, mut calls) = GatedBackend::new();
    let h = signed_in(backend);

    let cart = h.cart.clone();
    let task = tokio::spawn(async move { cart.hydrate().await });
    let fetch = calls.recv().await.unwrap();
    assert_eq!(fetch.call, Call::FetchCart);
    fetch.reply(Reply::Cart(Ok(snapshot(lines))));
    task.await.unwrap().unwrap();

    (h, calls)
}

fn spawn_update(cart: &CartSync, id: &'static str, quantity: i64) -> Spawned {
    let cart = cart.clone();
    tokio::spawn(async move { cart.update_quantity(&pid(id), quantity).await })
}

fn spawn_remove(cart: &CartSync, id: &'static str) -> Spawned {
    let cart = cart.clone();
    tokio::spawn(async move { cart.remove_item(&pid(id)).await })
}

fn spawn_add(cart: &CartSync, id: &'static str, quantity: i64) -> Spawned {
    let cart = cart.clone();
    tokio::spawn(async move { cart.add_item(&product(id), quantity).await })
}

fn spawn_refresh(cart: &CartSync) -> Spawned {
    let cart = cart.clone();
    tokio::spawn(async move { cart.refresh().await })
}

fn quantity_of(state: &CartState, id: &str) -> Option<i64> {
    state.lines.get(&pid(id)).map(|l| l.quantity)
}

// =============================================================================
// Stale Product Responses
// =============================================================================

#[tokio::test]
async fn test_older_update_response_is_ignored() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let first = spawn_update(&h.cart, "p1", 2);
    let first_call = calls.recv().await.unwrap();
    assert_eq!(first_call.call, Call::Update(pid("p1"), 2));

    let second = spawn_update(&h.cart, "p1", 5);
    let second_call = calls.recv().await.unwrap();
    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(5));

    second_call.reply(Reply::Line(Ok(line("p1", 5))));
    second.await.unwrap().unwrap();
    // The first request is still out
    assert_eq!(h.cart.status(), SyncStatus::Syncing);

    first_call.reply(Reply::Line(Ok(line("p1", 2))));
    first.await.unwrap().unwrap();

    let state = h.cart.state();
    assert_eq!(quantity_of(&state, "p1"), Some(5));
    assert_eq!(state.sync_status, SyncStatus::Idle);
}

#[tokio::test]
async fn test_stale_failure_does_not_roll_back() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let first = spawn_update(&h.cart, "p1", 2);
    let first_call = calls.recv().await.unwrap();
    let second = spawn_update(&h.cart, "p1", 5);
    let second_call = calls.recv().await.unwrap();

    second_call.reply(Reply::Line(Ok(line("p1", 5))));
    second.await.unwrap().unwrap();

    first_call.reply(Reply::Line(Err(BackendError::Transport("connection reset".into()))));
    assert!(first.await.unwrap().is_err());

    let state = h.cart.state();
    assert_eq!(quantity_of(&state, "p1"), Some(5));
    assert_eq!(state.sync_status, SyncStatus::Idle);
    assert!(state.last_error.is_none());
}

// =============================================================================
// Remove Wins
// =============================================================================

#[tokio::test]
async fn test_remove_wins_over_late_update_response() {
    let (h, mut calls) = hydrated(vec![line("p1", 1), line("p2", 1)]).await;

    let update = spawn_update(&h.cart, "p1", 3);
    let update_call = calls.recv().await.unwrap();
    let remove = spawn_remove(&h.cart, "p1");
    let remove_call = calls.recv().await.unwrap();
    assert_eq!(remove_call.call, Call::Remove(pid("p1")));

    remove_call.reply(Reply::Ack(Ok(true)));
    remove.await.unwrap().unwrap();

    update_call.reply(Reply::Line(Ok(line("p1", 3))));
    update.await.unwrap().unwrap();

    let state = h.cart.state();
    assert!(!state.lines.contains(&pid("p1")));
    assert_eq!(state.total_item_count(), 1);
    assert_eq!(state.sync_status, SyncStatus::Idle);
}

#[tokio::test]
async fn test_remove_wins_when_update_answers_first() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let update = spawn_update(&h.cart, "p1", 3);
    let update_call = calls.recv().await.unwrap();
    let remove = spawn_remove(&h.cart, "p1");
    let remove_call = calls.recv().await.unwrap();

    update_call.reply(Reply::Line(Ok(line("p1", 3))));
    update.await.unwrap().unwrap();
    assert!(!h.cart.state().lines.contains(&pid("p1")));

    remove_call.reply(Reply::Ack(Ok(true)));
    remove.await.unwrap().unwrap();

    let state = h.cart.state();
    assert!(state.is_empty());
    assert_eq!(state.sync_status, SyncStatus::Idle);
}

// =============================================================================
// Rollback Targets
// =============================================================================

#[tokio::test]
async fn test_rejected_add_after_acknowledged_remove_stays_removed() {
    let (h, mut calls) = hydrated(vec![line("p1", 2)]).await;

    let remove = spawn_remove(&h.cart, "p1");
    let remove_call = calls.recv().await.unwrap();
    let add = spawn_add(&h.cart, "p1", 1);
    let add_call = calls.recv().await.unwrap();
    assert_eq!(add_call.call, Call::Add(pid("p1"), 1));
    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(1));

    remove_call.reply(Reply::Ack(Ok(true)));
    remove.await.unwrap().unwrap();

    add_call.reply(Reply::Line(Err(BackendError::rejected(
        "OUT_OF_STOCK",
        "Only 0 left in stock",
    ))));
    assert!(add.await.unwrap().is_err());

    let state = h.cart.state();
    assert!(!state.lines.contains(&pid("p1")));
    assert_eq!(state.sync_status, SyncStatus::Error);
    assert_eq!(state.last_error.as_deref(), Some("Only 0 left in stock"));
}

#[tokio::test]
async fn test_rejected_update_reverts_to_newest_confirmed_quantity() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let first = spawn_update(&h.cart, "p1", 5);
    let first_call = calls.recv().await.unwrap();
    let second = spawn_update(&h.cart, "p1", 7);
    let second_call = calls.recv().await.unwrap();
    assert_eq!(second_call.call, Call::Update(pid("p1"), 7));

    first_call.reply(Reply::Line(Ok(line("p1", 5))));
    first.await.unwrap().unwrap();
    // Stale for the display, which still shows the newer edit
    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(7));

    second_call.reply(Reply::Line(Err(BackendError::rejected(
        "OUT_OF_STOCK",
        "Only 5 left in stock",
    ))));
    assert!(second.await.unwrap().is_err());

    let state = h.cart.state();
    assert_eq!(quantity_of(&state, "p1"), Some(5));
    assert_eq!(state.sync_status, SyncStatus::Error);
}

#[tokio::test]
async fn test_older_confirmation_does_not_replace_newer_one() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let first = spawn_update(&h.cart, "p1", 2);
    let first_call = calls.recv().await.unwrap();
    let second = spawn_update(&h.cart, "p1", 3);
    let second_call = calls.recv().await.unwrap();
    let third = spawn_update(&h.cart, "p1", 9);
    let third_call = calls.recv().await.unwrap();

    second_call.reply(Reply::Line(Ok(line("p1", 3))));
    second.await.unwrap().unwrap();
    first_call.reply(Reply::Line(Ok(line("p1", 2))));
    first.await.unwrap().unwrap();

    third_call.reply(Reply::Line(Err(BackendError::Transport("connection reset".into()))));
    assert!(third.await.unwrap().is_err());

    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(3));
}

#[tokio::test]
async fn test_failure_after_stale_refresh_reverts_to_snapshot() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let refresh = spawn_refresh(&h.cart);
    let fetch = calls.recv().await.unwrap();
    let update = spawn_update(&h.cart, "p1", 6);
    let update_call = calls.recv().await.unwrap();
    let newer_refresh = spawn_refresh(&h.cart);
    let newer_fetch = calls.recv().await.unwrap();

    newer_fetch.reply(Reply::Cart(Ok(snapshot(vec![line("p1", 4)]))));
    newer_refresh.await.unwrap().unwrap();
    // The older snapshot is superseded for both views
    fetch.reply(Reply::Cart(Ok(snapshot(vec![line("p1", 2)]))));
    refresh.await.unwrap().unwrap();
    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(4));

    let add = spawn_add(&h.cart, "p1", 1);
    let add_call = calls.recv().await.unwrap();
    add_call.reply(Reply::Line(Err(BackendError::Transport("connection reset".into()))));
    assert!(add.await.unwrap().is_err());
    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(4));

    update_call.reply(Reply::Line(Ok(line("p1", 6))));
    update.await.unwrap().unwrap();
    assert_eq!(quantity_of(&h.cart.state(), "p1"), Some(4));
}

// =============================================================================
// Cart-Wide Requests
// =============================================================================

#[tokio::test]
async fn test_refresh_keeps_edits_issued_after_it() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let refresh = spawn_refresh(&h.cart);
    let fetch = calls.recv().await.unwrap();
    assert_eq!(fetch.call, Call::FetchCart);

    let add = spawn_add(&h.cart, "p2", 1);
    let add_call = calls.recv().await.unwrap();

    fetch.reply(Reply::Cart(Ok(snapshot(vec![line("p1", 4)]))));
    refresh.await.unwrap().unwrap();

    let state = h.cart.state();
    assert_eq!(quantity_of(&state, "p1"), Some(4));
    assert_eq!(quantity_of(&state, "p2"), Some(1));
    assert_eq!(state.sync_status, SyncStatus::Syncing);

    add_call.reply(Reply::Line(Ok(line("p2", 1))));
    add.await.unwrap().unwrap();

    let state = h.cart.state();
    assert_eq!(state.total_item_count(), 5);
    assert_eq!(state.sync_status, SyncStatus::Idle);
}

#[tokio::test]
async fn test_superseded_refresh_is_ignored() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let older = spawn_refresh(&h.cart);
    let older_fetch = calls.recv().await.unwrap();
    let newer = spawn_refresh(&h.cart);
    let newer_fetch = calls.recv().await.unwrap();

    newer_fetch.reply(Reply::Cart(Ok(snapshot(vec![line("p1", 3)]))));
    newer.await.unwrap().unwrap();

    older_fetch.reply(Reply::Cart(Ok(snapshot(vec![line("p1", 1), line("p2", 2)]))));
    older.await.unwrap().unwrap();

    let state = h.cart.state();
    assert_eq!(quantity_of(&state, "p1"), Some(3));
    assert!(!state.lines.contains(&pid("p2")));
}

#[tokio::test]
async fn test_clear_supersedes_in_flight_add() {
    let (h, mut calls) = hydrated(vec![line("p1", 1)]).await;

    let add = spawn_add(&h.cart, "p2", 1);
    let add_call = calls.recv().await.unwrap();

    let cart = h.cart.clone();
    let clear = tokio::spawn(async move {
        cart.clear_cart(storefront_sync::ClearConfirmed::by_user())
            .await
    });
    let clear_call = calls.recv().await.unwrap();
    assert_eq!(clear_call.call, Call::Clear);

    add_call.reply(Reply::Line(Ok(line("p2", 1))));
    add.await.unwrap().unwrap();
    assert!(h.cart.state().is_empty());

    clear_call.reply(Reply::Ack(Ok(true)));
    clear.await.unwrap().unwrap();

    let state = h.cart.state();
    assert!(state.is_empty());
    assert_eq!(state.sync_status, SyncStatus::Idle);
}

#[tokio::test]
async fn test_unacknowledged_remove_refetches() {
    let (h, mut calls) = hydrated(vec![line("p1", 2)]).await;

    let remove = spawn_remove(&h.cart, "p1");
    let remove_call = calls.recv().await.unwrap();
    assert!(h.cart.state().is_empty());
    remove_call.reply(Reply::Ack(Ok(false)));

    let refetch = calls.recv().await.unwrap();
    assert_eq!(refetch.call, Call::FetchCart);
    assert_eq!(h.cart.status(), SyncStatus::Error);
    refetch.reply(Reply::Cart(Ok(snapshot(vec![line("p1", 2)]))));

    let err = remove.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("did not confirm"));

    let state = h.cart.state();
    assert_eq!(quantity_of(&state, "p1"), Some(2));
    assert_eq!(state.sync_status, SyncStatus::Error);
}
