//! # Cart Reducer
//!
//! The client-held cart as a pure reducer over a small list of lines.
//!
//! ## Reducer Actions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Reducer Actions                                 │
//! │                                                                         │
//! │  Action                  Effect on CartLines                            │
//! │  ──────                  ──────────────────                             │
//! │                                                                         │
//! │  Add(line) ────────────► merge (sum quantity) or push                   │
//! │                                                                         │
//! │  SetQuantity(id, q) ───► lines[id].quantity = q     (q ≥ 1 only)        │
//! │                                                                         │
//! │  Remove(id) ───────────► retain(≠ id)                                   │
//! │                                                                         │
//! │  Clear ────────────────► lines.clear()                                  │
//! │                                                                         │
//! │  NOTE: a failed action leaves the lines exactly as they were.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Server lines bypass the reducer: snapshots go through
//! [`CartLines::from_server`] and single confirmed lines through
//! [`CartLines::restore`].
//!
//! ## Invariants
//! - Lines are unique by `product_id`
//! - Quantity is always ≥ 1; a zero target goes through `Remove`
//! - `total_item_count` and `subtotal` are computed from lines, never stored

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, ProductId, SyncStatus};
use crate::validation::{validate_cart_size, validate_quantity, validate_unit_price};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Actions
// =============================================================================

/// A single mutation of the cart lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Merge into an existing line (sums quantity) or insert a new one.
    Add(CartLine),
    /// Replace a line's quantity. Rejects `quantity <= 0`.
    SetQuantity {
        product_id: ProductId,
        quantity: i64,
    },
    /// Delete a line.
    Remove(ProductId),
    /// Delete every line.
    Clear,
}

// =============================================================================
// Cart Lines
// =============================================================================

/// The set of lines, unique by product, kept in insertion order for display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartLines {
    lines: Vec<CartLine>,
}

impl CartLines {
    /// Creates an empty set of lines.
    pub fn new() -> Self {
        CartLines { lines: Vec::new() }
    }

    /// Builds lines from a server snapshot, merging duplicate products.
    pub fn from_server(lines: Vec<CartLine>) -> Self {
        let mut merged = CartLines::new();
        for line in lines {
            if line.quantity <= 0 {
                continue;
            }
            match merged.position(&line.product_id) {
                Some(idx) => merged.lines[idx].quantity += line.quantity,
                None => merged.lines.push(line),
            }
        }
        merged
    }

    /// Applies one action. On error the lines are unchanged.
    pub fn apply(&mut self, action: CartAction) -> CoreResult<()> {
        match action {
            CartAction::Add(line) => self.add(line),
            CartAction::SetQuantity {
                product_id,
                quantity,
            } => self.set_quantity(&product_id, quantity),
            CartAction::Remove(product_id) => self.remove(&product_id),
            CartAction::Clear => {
                self.lines.clear();
                Ok(())
            }
        }
    }

    fn add(&mut self, line: CartLine) -> CoreResult<()> {
        validate_quantity(line.quantity)?;
        validate_unit_price(line.unit_price.cents())?;

        if let Some(idx) = self.position(&line.product_id) {
            let new_qty = self.lines[idx].quantity + line.quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            self.lines[idx].quantity = new_qty;
            return Ok(());
        }

        validate_cart_size(self.lines.len()).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_LINES,
        })?;
        self.lines.push(line);
        Ok(())
    }

    fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| &l.product_id == product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    fn remove(&mut self, product_id: &ProductId) -> CoreResult<()> {
        let idx = self
            .position(product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.clone()))?;
        self.lines.remove(idx);
        Ok(())
    }

    /// Server lines are authoritative: no size or quantity caps apply, and a
    /// non-positive quantity means the server dropped the line.
    fn upsert(&mut self, line: CartLine) {
        let idx = self.position(&line.product_id);
        match (idx, line.quantity > 0) {
            (Some(i), true) => self.lines[i] = line,
            (Some(i), false) => {
                self.lines.remove(i);
            }
            (None, true) => self.lines.push(line),
            (None, false) => {}
        }
    }

    /// Sets a product's line to a known version, or removes it for `None`.
    ///
    /// Used to roll a single product back to its last confirmed state.
    pub fn restore(&mut self, product_id: &ProductId, line: Option<CartLine>) {
        match line {
            Some(line) => self.upsert(line),
            None => {
                self.lines.retain(|l| &l.product_id != product_id);
            }
        }
    }

    fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.lines.iter().position(|l| &l.product_id == product_id)
    }

    /// Returns the line for a product, if present.
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Checks whether a product has a line.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.position(product_id).is_some()
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter()
    }

    pub fn as_slice(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of all quantities.
    pub fn total_item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of all line totals.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// The aggregate client-visible cart.
///
/// ## Status Invariant
/// `last_error` is `Some` exactly when `sync_status == Error`. The status
/// helpers below are the only way the sync engine moves between states.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    pub lines: CartLines,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
    /// When the last confirmed server response was applied.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl CartState {
    /// Creates an empty, idle cart (session start before hydration).
    pub fn new() -> Self {
        CartState::default()
    }

    pub fn total_item_count(&self) -> i64 {
        self.lines.total_item_count()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.subtotal()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// A request went out: show busy, keep the current lines rendered.
    pub fn begin_sync(&mut self) {
        self.sync_status = SyncStatus::Syncing;
        self.last_error = None;
    }

    /// A request succeeded. Stay busy while others are still in flight.
    pub fn settle(&mut self, still_in_flight: bool) {
        self.sync_status = if still_in_flight {
            SyncStatus::Syncing
        } else {
            SyncStatus::Idle
        };
        self.last_error = None;
    }

    /// A request failed.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Error;
        self.last_error = Some(message.into());
    }

    /// Records the time of a confirmed server response.
    pub fn touch_synced(&mut self) {
        self.last_synced_at = Some(Utc::now());
    }
}

// =============================================================================
// Render View
// =============================================================================

/// One rendered line, with its derived total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// The cart as handed to the frontend, derived values filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSummary {
    pub lines: Vec<CartLineView>,
    pub total_item_count: i64,
    pub subtotal: Money,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
    #[ts(as = "Option<String>")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl From<&CartState> for CartSummary {
    fn from(state: &CartState) -> Self {
        CartSummary {
            lines: state
                .lines
                .iter()
                .map(|l| CartLineView {
                    product_id: l.product_id.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    line_total: l.line_total(),
                })
                .collect(),
            total_item_count: state.total_item_count(),
            subtotal: state.subtotal(),
            sync_status: state.sync_status,
            last_error: state.last_error.clone(),
            last_synced_at: state.last_synced_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
