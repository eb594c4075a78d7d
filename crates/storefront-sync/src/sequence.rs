//! # Request Sequencing
//!
//! Cart requests may race and their responses arrive in any order. Every
//! request is stamped with a [`Ticket`] and a response is applied only while
//! its ticket is still current.
//!
//! ## Currency Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seq:   1          2          3          4                              │
//! │         add(p1)    update(p1) refresh    add(p2)                        │
//! │                                                                         │
//! │  Product ticket current ⇔ seq == latest[p] AND seq > latest_cart        │
//! │  Cart ticket current    ⇔ seq == latest_cart                            │
//! │                                                                         │
//! │  After seq 4:  #1 stale (superseded by #2, and older than refresh #3)   │
//! │                #2 stale (older than refresh #3)                         │
//! │                #3 current; p2 is kept local when #3 lands               │
//! │                #4 current                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A remove is a product op like any other, so a remove issued after an
//! update supersedes it and the update's late response is discarded.

use std::collections::HashMap;

use storefront_core::ProductId;

/// Stamp carried by one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ticket {
    /// Scoped to one product line.
    Product { seq: u64, product_id: ProductId },
    /// Scoped to the whole cart (refresh, clear).
    Cart { seq: u64 },
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        match self {
            Ticket::Product { seq, .. } | Ticket::Cart { seq } => *seq,
        }
    }
}

/// Issues tickets and judges which responses are still current.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last_issued: u64,
    latest_cart: u64,
    latest_by_product: HashMap<ProductId, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.last_issued += 1;
        self.last_issued
    }

    /// Stamps a request scoped to `product_id`.
    pub fn issue_product(&mut self, product_id: &ProductId) -> Ticket {
        let seq = self.next();
        self.latest_by_product.insert(product_id.clone(), seq);
        Ticket::Product {
            seq,
            product_id: product_id.clone(),
        }
    }

    /// Stamps a cart-wide request.
    ///
    /// Every product op issued so far is now older than the cart op, so
    /// the per-product entries can go.
    pub fn issue_cart(&mut self) -> Ticket {
        let seq = self.next();
        self.latest_cart = seq;
        self.latest_by_product.clear();
        Ticket::Cart { seq }
    }

    /// Whether a response for `ticket` may still change the cart.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        match ticket {
            Ticket::Product { seq, product_id } => {
                *seq > self.latest_cart
                    && self.latest_by_product.get(product_id).copied() == Some(*seq)
            }
            Ticket::Cart { seq } => *seq == self.latest_cart,
        }
    }

    /// Products with an op issued after `seq`.
    ///
    /// Their rendered lines carry newer local intent than a cart-wide
    /// snapshot requested at `seq`.
    pub fn products_issued_after(&self, seq: u64) -> Vec<ProductId> {
        self.latest_by_product
            .iter()
            .filter(|(_, latest)| **latest > seq)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }
}
