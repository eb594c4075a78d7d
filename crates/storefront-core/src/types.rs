//! # Domain Types
//!
//! Core cart types shared by the reducer, the sync engine and the frontend.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ProductId     │   │    CartLine     │   │  CartSnapshot   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  opaque string  │   │  product_id     │   │  lines          │       │
//! │  │  unique key     │   │  quantity ≥ 1   │   │  total_items    │       │
//! │  └─────────────────┘   │  unit_price     │   │  subtotal       │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   ProductRef    │   │   SyncStatus    │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  id             │   │  Idle           │                             │
//! │  │  unit_price     │   │  Syncing        │                             │
//! │  └─────────────────┘   │  Error          │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `CartLine.unit_price` is frozen when the line is added, the same way a
//! receipt freezes the shelf price. The server may recompute it on any
//! confirmation, and the confirmed line then replaces the local one.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::validate_product_id;

// =============================================================================
// Product Identity
// =============================================================================

/// Opaque product identifier, unique within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a validated product identifier.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::ProductId;
    ///
    /// assert!(ProductId::new("prod_01H8X").is_ok());
    /// assert!(ProductId::new("").is_err());
    /// assert!(ProductId::new("has space").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validate_product_id(&id)?;
        Ok(ProductId(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The listing data a product page already renders.
///
/// `add_item` needs a price to show an optimistic line before the server
/// answers, so callers pass the price they displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductRef {
    pub id: ProductId,
    pub unit_price: Money,
}

impl ProductRef {
    pub fn new(id: ProductId, unit_price: Money) -> Self {
        ProductRef { id, unit_price }
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One product's presence in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Unique key within the cart.
    pub product_id: ProductId,

    /// Quantity in cart (always ≥ 1).
    pub quantity: i64,

    /// Unit price at time of adding (server may recompute on sync).
    pub unit_price: Money,
}

impl CartLine {
    /// Creates a line. Quantity and price are checked by the reducer.
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        CartLine {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// Line total (unit price × quantity). Always derived, never stored.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Aggregate network status of the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncStatus {
    /// Nothing in flight; rendered lines are authoritative enough to display.
    #[default]
    Idle,
    /// A request is in flight; the pre-request lines stay rendered.
    Syncing,
    /// The most recent request failed; `last_error` carries the message.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Server Snapshot
// =============================================================================

/// The cart as reported by the backend's `cart` query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub total_item_count: i64,
    pub subtotal: Money,
}

impl CartSnapshot {
    /// Checks the server's reported totals against the lines it sent.
    ///
    /// The client never trusts the reported figures: totals are always
    /// recomputed from lines. A mismatch only signals server-side drift.
    pub fn reported_totals_match(&self) -> bool {
        let count: i64 = self.lines.iter().map(|l| l.quantity).sum();
        let subtotal: Money = self.lines.iter().map(CartLine::line_total).sum();
        count == self.total_item_count && subtotal == self.subtotal
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
