//! # GraphQL Wire Contract
//!
//! Documents, envelopes and wire shapes for the cart operations.
//!
//! ## Message Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request (POST, application/json)                                       │
//! │  {                                                                      │
//! │    "query": "mutation AddToCart($productId: ID!, ...) { ... }",        │
//! │    "operationName": "AddToCart",                                        │
//! │    "variables": { "productId": "p1", "quantity": 2 }                    │
//! │  }                                                                      │
//! │                                                                         │
//! │  Response                                                               │
//! │  {                                                                      │
//! │    "data":   { "addToCart": { "productId": "p1", ... } } | null,        │
//! │    "errors": [ { "message": "...",                                      │
//! │                  "extensions": { "code": "OUT_OF_STOCK" } } ]           │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money crosses the wire as integer cents (`unitPriceCents`,
//! `subtotalCents`).

use serde::{Deserialize, Serialize};
use storefront_core::{
    CartLine, CartSnapshot, Money, ProductId, MAX_CART_LINES, MAX_ITEM_QUANTITY,
};

use crate::error::{BackendError, BackendResult};

// =============================================================================
// Operations
// =============================================================================

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub document: &'static str,
}

pub const CART: Operation = Operation {
    name: "Cart",
    document: "query Cart { cart { items { productId quantity unitPriceCents } totalItemCount subtotalCents } }",
};

pub const CART_ITEM_COUNT: Operation = Operation {
    name: "CartItemCount",
    document: "query CartItemCount { cartItemCount }",
};

pub const ADD_TO_CART: Operation = Operation {
    name: "AddToCart",
    document: "mutation AddToCart($productId: ID!, $quantity: Int!) { addToCart(productId: $productId, quantity: $quantity) { productId quantity unitPriceCents } }",
};

pub const UPDATE_CART_ITEM: Operation = Operation {
    name: "UpdateCartItem",
    document: "mutation UpdateCartItem($productId: ID!, $quantity: Int!) { updateCartItem(productId: $productId, quantity: $quantity) { productId quantity unitPriceCents } }",
};

pub const REMOVE_FROM_CART: Operation = Operation {
    name: "RemoveFromCart",
    document: "mutation RemoveFromCart($productId: ID!) { removeFromCart(productId: $productId) }",
};

pub const CLEAR_CART: Operation = Operation {
    name: "ClearCart",
    document: "mutation ClearCart { clearCart }",
};

// =============================================================================
// Envelopes
// =============================================================================

/// Request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub operation_name: &'a str,
    pub variables: V,
}

impl<'a, V: Serialize> GraphqlRequest<'a, V> {
    pub fn new(operation: &'a Operation, variables: V) -> Self {
        GraphqlRequest {
            query: operation.document,
            operation_name: operation.name,
            variables,
        }
    }
}

/// Variables for operations that take none.
#[derive(Debug, Default, Serialize)]
pub struct NoVariables {}

/// Variables for `AddToCart` and `UpdateCartItem`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineVariables<'a> {
    pub product_id: &'a str,
    pub quantity: i64,
}

/// Variables for `RemoveFromCart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariables<'a> {
    pub product_id: &'a str,
}

/// Response body.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorExtensions {
    pub code: Option<String>,
}

impl GraphqlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

impl<T> GraphqlResponse<T> {
    /// Turns the envelope into data or a classified error.
    ///
    /// The first error decides: auth codes hand off to the session, anything
    /// else is a business rejection carrying the server's message.
    pub fn into_result(self) -> BackendResult<T> {
        if let Some(GraphqlError {
            message,
            extensions,
        }) = self.errors.into_iter().next()
        {
            let code = extensions.and_then(|e| e.code);
            return Err(match code.as_deref() {
                Some("UNAUTHENTICATED") | Some("FORBIDDEN") => BackendError::Unauthorized,
                code => BackendError::rejected(code.unwrap_or("GRAPHQL_ERROR"), message),
            });
        }

        self.data.ok_or_else(|| {
            BackendError::InvalidResponse("response carried neither data nor errors".into())
        })
    }
}

// =============================================================================
// Wire Shapes
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl TryFrom<WireLine> for CartLine {
    type Error = BackendError;

    fn try_from(wire: WireLine) -> Result<Self, Self::Error> {
        let product_id = ProductId::new(wire.product_id)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        if !(0..=MAX_ITEM_QUANTITY).contains(&wire.quantity) {
            return Err(BackendError::InvalidResponse(format!(
                "quantity {} out of range for {}",
                wire.quantity, product_id
            )));
        }
        if wire.unit_price_cents < 0 {
            return Err(BackendError::InvalidResponse(format!(
                "negative unit price for {}",
                product_id
            )));
        }
        // Line totals and subtotals must fit in i64 cents
        if wire
            .unit_price_cents
            .checked_mul(MAX_ITEM_QUANTITY * MAX_CART_LINES as i64)
            .is_none()
        {
            return Err(BackendError::InvalidResponse(format!(
                "unit price {} out of range for {}",
                wire.unit_price_cents, product_id
            )));
        }
        Ok(CartLine::new(
            product_id,
            wire.quantity,
            Money::from_cents(wire.unit_price_cents),
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCart {
    #[serde(default)]
    pub items: Vec<WireLine>,
    pub total_item_count: i64,
    pub subtotal_cents: i64,
}

impl TryFrom<WireCart> for CartSnapshot {
    type Error = BackendError;

    fn try_from(wire: WireCart) -> Result<Self, Self::Error> {
        if wire.items.len() > MAX_CART_LINES {
            return Err(BackendError::InvalidResponse(format!(
                "cart carried {} lines, limit is {}",
                wire.items.len(),
                MAX_CART_LINES
            )));
        }
        let lines = wire
            .items
            .into_iter()
            .map(CartLine::try_from)
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(CartSnapshot {
            lines,
            total_item_count: wire.total_item_count,
            subtotal: Money::from_cents(wire.subtotal_cents),
        })
    }
}

/// `data` of `Cart`. A `null` cart means the shopper has none yet.
#[derive(Debug, Deserialize)]
pub struct CartData {
    pub cart: Option<WireCart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCountData {
    pub cart_item_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartData {
    pub add_to_cart: WireLine,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemData {
    pub update_cart_item: WireLine,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartData {
    pub remove_from_cart: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCartData {
    pub clear_cart: bool,
}
