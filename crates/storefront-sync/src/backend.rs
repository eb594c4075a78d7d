//! # Cart Backend Boundary
//!
//! The six remote operations the cart core consumes. The schema and
//! resolvers belong to the backend; this trait is only the contract.
//!
//! | Operation          | GraphQL            | Returns           |
//! |--------------------|--------------------|-------------------|
//! | `fetch_cart`       | `query Cart`       | full snapshot     |
//! | `fetch_item_count` | `query CartItemCount` | badge count    |
//! | `add_item`         | `mutation AddToCart`  | updated line   |
//! | `update_item`      | `mutation UpdateCartItem` | updated line |
//! | `remove_item`      | `mutation RemoveFromCart` | success flag |
//! | `clear_cart`       | `mutation ClearCart`  | success flag   |
//!
//! Every call carries the bearer credential explicitly. A missing
//! credential is caught before the backend is ever reached.

use async_trait::async_trait;
use storefront_core::{CartLine, CartSnapshot, ProductId};

use crate::auth::Credential;
use crate::error::BackendResult;

/// Remote cart operations.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Fetches the current cart.
    async fn fetch_cart(&self, credential: &Credential) -> BackendResult<CartSnapshot>;

    /// Fetches the item count only. Cheap enough to poll.
    async fn fetch_item_count(&self, credential: &Credential) -> BackendResult<i64>;

    /// Adds quantity to a product's line; returns the merged server line.
    async fn add_item(
        &self,
        credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine>;

    /// Sets a line's quantity; returns the server line.
    async fn update_item(
        &self,
        credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine>;

    /// Deletes a line.
    async fn remove_item(&self, credential: &Credential, product_id: &ProductId)
        -> BackendResult<bool>;

    /// Deletes every line.
    async fn clear_cart(&self, credential: &Credential) -> BackendResult<bool>;
}
