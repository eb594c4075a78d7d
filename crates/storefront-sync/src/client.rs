//! # GraphQL HTTP Client
//!
//! [`CartBackend`] over GraphQL on HTTPS.
//!
//! ## Status Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP status            Outcome                                         │
//! │  ───────────            ───────                                         │
//! │  200, 400 + body ─────► GraphQL envelope decides (data / errors[])      │
//! │  401, 403 ────────────► BackendError::Unauthorized                      │
//! │  429, 5xx ────────────► BackendError::Transport   (retryable)           │
//! │  other ───────────────► BackendError::InvalidResponse                   │
//! │  connect / reset ─────► BackendError::Transport                         │
//! │  client timeout ──────► BackendError::Timeout                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use storefront_core::{CartLine, CartSnapshot, ProductId};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::Credential;
use crate::backend::CartBackend;
use crate::config::StorefrontConfig;
use crate::error::{BackendError, BackendResult, SyncResult};
use crate::graphql::{
    self, AddToCartData, CartData, ClearCartData, GraphqlRequest, GraphqlResponse, ItemCountData,
    LineVariables, NoVariables, Operation, ProductVariables, RemoveFromCartData,
    UpdateCartItemData,
};

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// GraphQL-over-HTTP cart backend.
#[derive(Debug, Clone)]
pub struct GraphqlCartBackend {
    http: Client,
    endpoint: Url,
    timeout: Duration,
}

impl GraphqlCartBackend {
    /// Builds a client from validated configuration.
    pub fn new(config: &StorefrontConfig) -> SyncResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .user_agent(config.api.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        Ok(GraphqlCartBackend {
            http,
            endpoint: Url::parse(&config.api.endpoint)?,
            timeout: config.request_timeout(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Sends one operation and unwraps its `data`.
    async fn execute<V, T>(
        &self,
        credential: &Credential,
        operation: &Operation,
        variables: V,
    ) -> BackendResult<T>
    where
        V: Serialize + Send,
        T: DeserializeOwned,
    {
        let request_id = Uuid::new_v4();
        debug!(operation = operation.name, %request_id, "Sending GraphQL request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(credential.token())
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(&GraphqlRequest::new(operation, variables))
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(operation = operation.name, %request_id, %status, "Credential rejected");
                return Err(BackendError::Unauthorized);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(BackendError::Transport("rate limited by server".into()));
            }
            s if s.is_server_error() => {
                warn!(operation = operation.name, %request_id, %status, "Server error");
                return Err(BackendError::Transport(format!("server returned {}", status)));
            }
            s if s.is_success() || s == StatusCode::BAD_REQUEST => {}
            _ => {
                return Err(BackendError::InvalidResponse(format!(
                    "unexpected status {}",
                    status
                )));
            }
        }

        let body: GraphqlResponse<T> = response
            .json()
            .await
            .map_err(|e| self.classify_send_error(e))?;
        let result = body.into_result();

        if let Err(ref e) = result {
            debug!(operation = operation.name, %request_id, error = %e, "GraphQL operation failed");
        }
        result
    }

    fn classify_send_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout)
        } else {
            BackendError::from(err)
        }
    }
}

#[async_trait]
impl CartBackend for GraphqlCartBackend {
    async fn fetch_cart(&self, credential: &Credential) -> BackendResult<CartSnapshot> {
        let data: CartData = self
            .execute(credential, &graphql::CART, NoVariables::default())
            .await?;
        match data.cart {
            Some(wire) => CartSnapshot::try_from(wire),
            None => Ok(CartSnapshot::default()),
        }
    }

    async fn fetch_item_count(&self, credential: &Credential) -> BackendResult<i64> {
        let data: ItemCountData = self
            .execute(credential, &graphql::CART_ITEM_COUNT, NoVariables::default())
            .await?;
        Ok(data.cart_item_count)
    }

    async fn add_item(
        &self,
        credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine> {
        let vars = LineVariables {
            product_id: product_id.as_str(),
            quantity,
        };
        let data: AddToCartData = self.execute(credential, &graphql::ADD_TO_CART, vars).await?;
        CartLine::try_from(data.add_to_cart)
    }

    async fn update_item(
        &self,
        credential: &Credential,
        product_id: &ProductId,
        quantity: i64,
    ) -> BackendResult<CartLine> {
        let vars = LineVariables {
            product_id: product_id.as_str(),
            quantity,
        };
        let data: UpdateCartItemData = self
            .execute(credential, &graphql::UPDATE_CART_ITEM, vars)
            .await?;
        CartLine::try_from(data.update_cart_item)
    }

    async fn remove_item(
        &self,
        credential: &Credential,
        product_id: &ProductId,
    ) -> BackendResult<bool> {
        let vars = ProductVariables {
            product_id: product_id.as_str(),
        };
        let data: RemoveFromCartData = self
            .execute(credential, &graphql::REMOVE_FROM_CART, vars)
            .await?;
        Ok(data.remove_from_cart)
    }

    async fn clear_cart(&self, credential: &Credential) -> BackendResult<bool> {
        let data: ClearCartData = self
            .execute(credential, &graphql::CLEAR_CART, NoVariables::default())
            .await?;
        Ok(data.clear_cart)
    }
}
