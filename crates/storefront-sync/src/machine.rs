//! # Cart Sync State Machine
//!
//! [`CartSync`] is the single writer of the client-side cart. It applies
//! edits optimistically, confirms them with the backend, and publishes every
//! transition to [`CartReader`]s.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Optimistic Cart Operation                            │
//! │                                                                         │
//! │  caller ──► credential? ── None ──► redirect_to_login, Unauthenticated │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  ┌──────────── lock ────────────┐                                      │
//! │  │ 1. apply locally (reducer)   │── CoreError ──► Err, state unchanged │
//! │  │ 2. issue ticket (seq)        │                                      │
//! │  │ 3. status = Syncing, publish │                                      │
//! │  └──────────── unlock ──────────┘                                      │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  backend call (bounded by request_timeout)                             │
//! │                 │                                                       │
//! │  ┌──────────── lock ────────────┐                                      │
//! │  │ ticket stale? ──► ignore     │                                      │
//! │  │ OK   ──► take server line    │                                      │
//! │  │ Err  ──► revert to confirmed │                                      │
//! │  │          status = Error      │                                      │
//! │  │ publish                      │                                      │
//! │  └──────────── unlock ──────────┘                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Handling
//!
//! | Operation         | On failure                                         |
//! |-------------------|----------------------------------------------------|
//! | `add_item`        | product reverts to its confirmed line              |
//! | `update_quantity` | product reverts to its confirmed line              |
//! | `remove_item`     | authoritative cart is refetched, no re-insert      |
//! | `clear_cart`      | no rollback, error surfaced                        |
//! | `refresh`         | lines untouched                                    |
//!
//! A server auth rejection reverts the edit (a removed line comes back from
//! the confirmed view) and hands off to [`AuthRedirect::session_expired`].
//!
//! Rollbacks target the newest server confirmation for the product. A
//! success whose ticket is stale leaves the display alone but still counts
//! there, so a later failure never resurrects a line the server already
//! removed or an older quantity.
//!
//! ## Status
//! Issuing a request moves to `Syncing` and clears the last error. A success
//! returns to `Idle` once nothing is in flight. A failure sets `Error`, which
//! stays visible until the next request is issued.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use storefront_core::{
    CartAction, CartLine, CartLines, CartSnapshot, CartState, ProductId, ProductRef, SyncStatus,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::auth::{AuthRedirect, Credential, CredentialSource};
use crate::backend::CartBackend;
use crate::config::StorefrontConfig;
use crate::error::{BackendError, BackendResult, SyncError, SyncResult};
use crate::reader::CartReader;
use crate::sequence::{SequenceTracker, Ticket};

// =============================================================================
// Clear Confirmation
// =============================================================================

/// Proof that the shopper confirmed emptying the cart.
///
/// Clearing is destructive and never rolls back, so the confirmation step
/// has to show up at the call site.
#[derive(Debug)]
pub struct ClearConfirmed {
    _private: (),
}

impl ClearConfirmed {
    /// The shopper answered "yes" to the clear-cart prompt.
    pub fn by_user() -> Self {
        ClearConfirmed { _private: () }
    }
}

// =============================================================================
// Confirmed View
// =============================================================================

/// Lines as last confirmed by the server, stamped with the sequence of the
/// request that confirmed them.
///
/// Confirmations fold in by sequence, not by arrival. A response too old to
/// change the display still moves this view forward, and a response older
/// than what is already recorded for its product is dropped.
#[derive(Default)]
struct ConfirmedLines {
    lines: CartLines,
    /// Last cart-wide confirmation (snapshot or clear).
    cart_seq: u64,
    /// Product confirmations newer than `cart_seq`.
    product_seq: HashMap<ProductId, u64>,
}

impl ConfirmedLines {
    fn get(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.get(product_id)
    }

    fn seq_of(&self, product_id: &ProductId) -> u64 {
        self.product_seq
            .get(product_id)
            .copied()
            .unwrap_or(0)
            .max(self.cart_seq)
    }

    /// Records one product's server line as of `seq`. `None` means removed.
    fn record_line(&mut self, seq: u64, product_id: &ProductId, line: Option<CartLine>) {
        if seq <= self.seq_of(product_id) {
            return;
        }
        self.product_seq.insert(product_id.clone(), seq);
        self.lines.restore(product_id, line);
    }

    /// Records the whole cart as of `seq`.
    ///
    /// Products confirmed by a later request keep their line.
    fn record_cart(&mut self, seq: u64, lines: CartLines) {
        if seq <= self.cart_seq {
            return;
        }
        let mut next = lines;
        for (product_id, _) in self.product_seq.iter().filter(|(_, s)| **s > seq) {
            next.restore(product_id, self.lines.get(product_id).cloned());
        }
        self.lines = next;
        self.cart_seq = seq;
        self.product_seq.retain(|_, s| *s > seq);
    }
}

// =============================================================================
// Machine State
// =============================================================================

/// Everything guarded by the machine lock.
struct Machine {
    /// What the shopper sees, optimistic edits included.
    displayed: CartState,
    confirmed: ConfirmedLines,
    seq: SequenceTracker,
    in_flight: usize,
}

impl Machine {
    fn begin_request(&mut self) {
        self.in_flight += 1;
        self.displayed.begin_sync();
    }

    fn end_request(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Settles after a success or an ignored response. An `Error` stays put.
    fn settle(&mut self) {
        if self.displayed.sync_status == SyncStatus::Syncing {
            self.displayed.settle(self.in_flight > 0);
        }
    }

    /// Rolls one product back to its last confirmed line.
    fn revert_product(&mut self, product_id: &ProductId) {
        let known_good = self.confirmed.get(product_id).cloned();
        self.displayed.lines.restore(product_id, known_good);
    }

    /// Takes a server line for one product (`None` once removed).
    ///
    /// The display only follows a current ticket.
    fn confirm_line(&mut self, ticket: &Ticket, product_id: &ProductId, line: Option<CartLine>) {
        self.confirmed.record_line(ticket.seq(), product_id, line.clone());
        if self.seq.is_current(ticket) {
            self.displayed.lines.restore(product_id, line);
            self.displayed.touch_synced();
        } else {
            log_stale(ticket);
        }
    }

    /// Takes a server snapshot requested by `ticket`.
    ///
    /// When current, it replaces the displayed lines except for products
    /// edited after the ticket was issued, which keep their local line.
    fn apply_snapshot(&mut self, ticket: &Ticket, snapshot: CartSnapshot) {
        if !snapshot.reported_totals_match() {
            warn!(
                reported_count = snapshot.total_item_count,
                reported_subtotal = %snapshot.subtotal,
                "Server totals disagree with its lines; using line sums"
            );
        }

        let lines = CartLines::from_server(snapshot.lines);
        self.confirmed.record_cart(ticket.seq(), lines.clone());
        if !self.seq.is_current(ticket) {
            log_stale(ticket);
            return;
        }

        let mut displayed = lines;
        for product_id in self.seq.products_issued_after(ticket.seq()) {
            displayed.restore(&product_id, self.displayed.lines.get(&product_id).cloned());
        }
        self.displayed.lines = displayed;
        self.displayed.touch_synced();
    }

    /// Takes the server's acknowledgement of a clear requested by `ticket`.
    fn confirm_cleared(&mut self, ticket: &Ticket) {
        self.confirmed.record_cart(ticket.seq(), CartLines::new());
        if self.seq.is_current(ticket) {
            self.displayed.touch_synced();
        } else {
            log_stale(ticket);
        }
    }
}

struct Inner {
    backend: Arc<dyn CartBackend>,
    credentials: Arc<dyn CredentialSource>,
    redirect: Arc<dyn AuthRedirect>,
    request_timeout: Duration,
    machine: Mutex<Machine>,
    state_tx: watch::Sender<CartState>,
}

// =============================================================================
// Cart Sync
// =============================================================================

/// Cloneable handle to the cart state machine.
#[derive(Clone)]
pub struct CartSync {
    inner: Arc<Inner>,
}

impl CartSync {
    /// Creates an empty, idle cart. Call [`CartSync::hydrate`] at session start.
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        backend: Arc<dyn CartBackend>,
        credentials: Arc<dyn CredentialSource>,
        redirect: Arc<dyn AuthRedirect>,
        config: &StorefrontConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        let (state_tx, _) = watch::channel(CartState::new());

        let machine = Machine {
            displayed: CartState::new(),
            confirmed: ConfirmedLines::default(),
            seq: SequenceTracker::new(),
            in_flight: 0,
        };

        Ok(CartSync {
            inner: Arc::new(Inner {
                backend,
                credentials,
                redirect,
                request_timeout: config.request_timeout(),
                machine: Mutex::new(machine),
                state_tx,
            }),
        })
    }

    /// Returns a read-only view for rendering.
    pub fn reader(&self) -> CartReader {
        CartReader::new(
            self.inner.state_tx.subscribe(),
            Arc::clone(&self.inner.credentials),
        )
    }

    /// Last published state.
    pub fn state(&self) -> CartState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.state_tx.borrow().sync_status
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Loads the cart at session start. Without a session this does nothing.
    pub async fn hydrate(&self) -> SyncResult<CartState> {
        match self.inner.credentials.credential() {
            Some(credential) => self.refresh_with(credential).await,
            None => {
                debug!("No session, skipping cart hydration");
                Ok(self.state())
            }
        }
    }

    /// Replaces the lines with the server's cart.
    pub async fn refresh(&self) -> SyncResult<CartState> {
        let credential = self.authenticate()?;
        self.refresh_with(credential).await
    }

    /// Adds `quantity` of a product, merging into an existing line.
    pub async fn add_item(&self, product: &ProductRef, quantity: i64) -> SyncResult<CartState> {
        let credential = self.authenticate()?;
        let product_id = &product.id;

        let ticket = {
            let mut m = self.inner.machine.lock().await;
            m.displayed.lines.apply(CartAction::Add(CartLine::new(
                product_id.clone(),
                quantity,
                product.unit_price,
            )))?;
            let ticket = m.seq.issue_product(product_id);
            m.begin_request();
            self.publish(&m);
            ticket
        };
        debug!(%product_id, seq = ticket.seq(), quantity, "Adding item");

        let result = self
            .call(self.inner.backend.add_item(&credential, product_id, quantity))
            .await;
        self.complete_line(ticket, product_id, result).await
    }

    /// Sets a line's quantity. Use [`CartSync::remove_item`] to delete.
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> SyncResult<CartState> {
        let credential = self.authenticate()?;

        let ticket = {
            let mut m = self.inner.machine.lock().await;
            m.displayed.lines.apply(CartAction::SetQuantity {
                product_id: product_id.clone(),
                quantity,
            })?;
            let ticket = m.seq.issue_product(product_id);
            m.begin_request();
            self.publish(&m);
            ticket
        };
        debug!(%product_id, seq = ticket.seq(), quantity, "Updating quantity");

        let result = self
            .call(self.inner.backend.update_item(&credential, product_id, quantity))
            .await;
        self.complete_line(ticket, product_id, result).await
    }

    /// Deletes a line immediately, then on the server.
    pub async fn remove_item(&self, product_id: &ProductId) -> SyncResult<CartState> {
        let credential = self.authenticate()?;

        let ticket = {
            let mut m = self.inner.machine.lock().await;
            m.displayed
                .lines
                .apply(CartAction::Remove(product_id.clone()))?;
            let ticket = m.seq.issue_product(product_id);
            m.begin_request();
            self.publish(&m);
            ticket
        };
        debug!(%product_id, seq = ticket.seq(), "Removing item");

        let result = self
            .call(self.inner.backend.remove_item(&credential, product_id))
            .await
            .and_then(|acked| require_ack(acked, "remove"));

        let err = match result {
            Ok(()) => {
                let mut m = self.inner.machine.lock().await;
                m.end_request();
                m.confirm_line(&ticket, product_id, None);
                m.settle();
                self.publish(&m);
                return Ok(m.displayed.clone());
            }
            Err(err) => err,
        };

        let refetch = {
            let mut m = self.inner.machine.lock().await;
            m.end_request();
            let refetch = if !m.seq.is_current(&ticket) {
                log_stale(&ticket);
                m.settle();
                None
            } else if err == BackendError::Unauthorized {
                m.revert_product(product_id);
                m.displayed.fail(err.to_string());
                None
            } else {
                warn!(%product_id, seq = ticket.seq(), error = %err, "Remove failed, refetching cart");
                m.displayed.fail(err.to_string());
                let refetch = m.seq.issue_cart();
                m.in_flight += 1;
                Some(refetch)
            };
            self.publish(&m);
            refetch
        };

        if err == BackendError::Unauthorized {
            self.inner.redirect.session_expired();
        }

        if let Some(refetch) = refetch {
            let snapshot = self
                .call(self.inner.backend.fetch_cart(&credential))
                .await;

            let mut m = self.inner.machine.lock().await;
            m.end_request();
            let current = m.seq.is_current(&refetch);
            match snapshot {
                Ok(snapshot) => m.apply_snapshot(&refetch, snapshot),
                Err(e) if current => {
                    warn!(error = %e, "Refetch after failed remove also failed")
                }
                Err(_) => log_stale(&refetch),
            }
            if current {
                m.displayed.fail(err.to_string());
            } else {
                m.settle();
            }
            self.publish(&m);
        }

        Err(err.into())
    }

    /// Empties the cart. Never rolls back.
    ///
    /// An already-empty cart is left alone and no request is sent.
    pub async fn clear_cart(&self, _confirmed: ClearConfirmed) -> SyncResult<CartState> {
        let credential = self.authenticate()?;

        let ticket = {
            let mut m = self.inner.machine.lock().await;
            if m.displayed.is_empty() {
                debug!("Cart already empty, nothing to clear");
                return Ok(m.displayed.clone());
            }
            m.displayed.lines.apply(CartAction::Clear)?;
            let ticket = m.seq.issue_cart();
            m.begin_request();
            self.publish(&m);
            ticket
        };
        info!(seq = ticket.seq(), "Clearing cart");

        let result = self
            .call(self.inner.backend.clear_cart(&credential))
            .await
            .and_then(|acked| require_ack(acked, "clear"));

        let mut m = self.inner.machine.lock().await;
        m.end_request();
        let current = m.seq.is_current(&ticket);
        let outcome = match result {
            Ok(()) => {
                m.confirm_cleared(&ticket);
                m.settle();
                Ok(())
            }
            Err(err) => {
                if current {
                    warn!(seq = ticket.seq(), error = %err, "Clear failed");
                    m.displayed.fail(err.to_string());
                } else {
                    log_stale(&ticket);
                    m.settle();
                }
                Err(err)
            }
        };
        self.publish(&m);
        let state = m.displayed.clone();
        drop(m);

        self.finish(outcome, state)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn authenticate(&self) -> SyncResult<Credential> {
        match self.inner.credentials.credential() {
            Some(credential) => Ok(credential),
            None => {
                info!("Cart operation without a session, redirecting to sign-in");
                self.inner.redirect.redirect_to_login();
                Err(SyncError::Unauthenticated)
            }
        }
    }

    async fn refresh_with(&self, credential: Credential) -> SyncResult<CartState> {
        let ticket = {
            let mut m = self.inner.machine.lock().await;
            let ticket = m.seq.issue_cart();
            m.begin_request();
            self.publish(&m);
            ticket
        };
        debug!(seq = ticket.seq(), "Refreshing cart");

        let result = self.call(self.inner.backend.fetch_cart(&credential)).await;

        let mut m = self.inner.machine.lock().await;
        m.end_request();
        let current = m.seq.is_current(&ticket);
        let outcome = match result {
            Ok(snapshot) => {
                m.apply_snapshot(&ticket, snapshot);
                m.settle();
                Ok(())
            }
            Err(err) => {
                if current {
                    warn!(seq = ticket.seq(), error = %err, "Cart refresh failed");
                    m.displayed.fail(err.to_string());
                } else {
                    log_stale(&ticket);
                    m.settle();
                }
                Err(err)
            }
        };
        self.publish(&m);
        let state = m.displayed.clone();
        drop(m);

        self.finish(outcome, state)
    }

    /// Applies the response to an add or update.
    async fn complete_line(
        &self,
        ticket: Ticket,
        product_id: &ProductId,
        result: BackendResult<CartLine>,
    ) -> SyncResult<CartState> {
        let mut m = self.inner.machine.lock().await;
        m.end_request();
        let current = m.seq.is_current(&ticket);

        let outcome = match result {
            Ok(line) => {
                m.confirm_line(&ticket, product_id, Some(line));
                m.settle();
                Ok(())
            }
            Err(err) => {
                if current {
                    warn!(%product_id, seq = ticket.seq(), error = %err, "Cart edit failed, reverting");
                    m.revert_product(product_id);
                    m.displayed.fail(err.to_string());
                } else {
                    log_stale(&ticket);
                    m.settle();
                }
                Err(err)
            }
        };

        debug!(%product_id, status = %m.displayed.sync_status, in_flight = m.in_flight, "Cart edit settled");
        self.publish(&m);
        let state = m.displayed.clone();
        drop(m);

        self.finish(outcome, state)
    }

    /// Hands auth failures to the session and converts the outcome.
    fn finish(&self, outcome: BackendResult<()>, state: CartState) -> SyncResult<CartState> {
        match outcome {
            Ok(()) => Ok(state),
            Err(err) => {
                if err == BackendError::Unauthorized {
                    self.inner.redirect.session_expired();
                }
                Err(err.into())
            }
        }
    }

    /// Runs one backend call under the request timeout.
    async fn call<T, F>(&self, request: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        match tokio::time::timeout(self.inner.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.inner.request_timeout)),
        }
    }

    fn publish(&self, machine: &Machine) {
        self.inner.state_tx.send_replace(machine.displayed.clone());
    }
}

fn require_ack(acked: bool, operation: &str) -> BackendResult<()> {
    if acked {
        Ok(())
    } else {
        Err(BackendError::rejected(
            "NOT_ACKNOWLEDGED",
            format!("The server did not confirm the {} request", operation),
        ))
    }
}

fn log_stale(ticket: &Ticket) {
    debug!(seq = ticket.seq(), "Ignoring stale response");
}
