//! # storefront-core: Pure Cart Logic for the Storefront
//!
//! This crate holds the client-side cart as pure data plus a reducer.
//! It knows nothing about GraphQL, credentials, or timers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Cart Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Storefront SPA (product pages, cart)            │   │
//! │  │        Add to Cart ──► Cart Drawer ──► Checkout entry           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CartSync / CartReader                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 storefront-sync (state machine)                 │   │
//! │  │   optimistic edits, sequencing, GraphQL client, badge poller    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │ validation│  │   │
//! │  │   │ CartLine  │  │   Money   │  │ CartLines │  │   rules   │  │   │
//! │  │   │ SyncStatus│  │           │  │ CartState │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - ProductId, CartLine, SyncStatus, CartSnapshot
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - The cart reducer and aggregate state
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::cart::{CartAction, CartLines};
//! use storefront_core::{CartLine, Money, ProductId};
//!
//! let mut lines = CartLines::new();
//! let p1 = ProductId::new("p1").unwrap();
//!
//! lines.apply(CartAction::Add(CartLine::new(p1.clone(), 2, Money::from_cents(499)))).unwrap();
//! lines.apply(CartAction::Add(CartLine::new(p1, 1, Money::from_cents(499)))).unwrap();
//!
//! assert_eq!(lines.len(), 1);
//! assert_eq!(lines.total_item_count(), 3);
//! assert_eq!(lines.subtotal().cents(), 1497);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartAction, CartLines, CartState, CartSummary};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart
///
/// ## Business Reason
/// Keeps the cart a handful of human-managed lines. The backend enforces
/// its own limit, this one stops runaway optimistic inserts locally.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single product in the cart
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of an opaque product identifier.
pub const MAX_PRODUCT_ID_LEN: usize = 128;
