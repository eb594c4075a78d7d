//! Read-only view of the cart for rendering.
//!
//! Readers never mutate. While no session exists they see an empty cart,
//! whatever the machine last held.

use std::sync::Arc;

use storefront_core::{CartState, CartSummary};
use tokio::sync::watch;

use crate::auth::CredentialSource;
use crate::error::{SyncError, SyncResult};

/// Subscriber to [`crate::CartSync`] transitions.
#[derive(Clone)]
pub struct CartReader {
    rx: watch::Receiver<CartState>,
    credentials: Arc<dyn CredentialSource>,
}

impl CartReader {
    pub(crate) fn new(rx: watch::Receiver<CartState>, credentials: Arc<dyn CredentialSource>) -> Self {
        CartReader { rx, credentials }
    }

    /// The cart as it should be rendered right now.
    pub fn current(&self) -> CartState {
        if !self.credentials.is_authenticated() {
            return CartState::new();
        }
        self.rx.borrow().clone()
    }

    /// [`CartReader::current`] with line totals and aggregates filled in.
    pub fn summary(&self) -> CartSummary {
        CartSummary::from(&self.current())
    }

    /// Waits for the next transition and returns the new view.
    pub async fn changed(&mut self) -> SyncResult<CartState> {
        self.rx
            .changed()
            .await
            .map_err(|_| SyncError::ChannelError("Cart state channel closed".into()))?;
        Ok(self.current())
    }
}
