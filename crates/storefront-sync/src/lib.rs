//! # storefront-sync: Cart Sync Engine for the Storefront
//!
//! This crate keeps the client-side cart in step with the server-owned
//! cart. Edits render immediately, then get confirmed or rolled back.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Sync Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     CartSync (single writer)                     │  │
//! │  │                                                                  │  │
//! │  │  add_item / update_quantity / remove_item / clear_cart          │  │
//! │  │  refresh / hydrate                                               │  │
//! │  └──────┬─────────────────────┬─────────────────────┬───────────────┘  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SequenceTracker│  │  CartBackend   │  │  CartReader (watch)    │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Tickets per    │  │ GraphQL over   │  │ Read-only render view  │    │
//! │  │ product / cart │  │ reqwest        │  │ Empty when signed out  │    │
//! │  │ Drops stale    │  │ Bearer token   │  │                        │    │
//! │  │ responses      │  │ Timeout bound  │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ItemCountPoller │  │ Auth seams     │  │  StorefrontConfig      │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Badge count    │  │ Credential-    │  │ TOML + env overrides   │    │
//! │  │ with backoff   │  │ Source,        │  │                        │    │
//! │  │                │  │ AuthRedirect   │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Cart Engine
//! - [`machine`] - `CartSync` state machine
//! - [`sequence`] - Request tickets and staleness rules
//! - [`reader`] - Read-only view for rendering
//! - [`poller`] - Badge item-count poller
//!
//! ### Backend
//! - [`backend`] - `CartBackend` trait
//! - [`graphql`] - Documents, envelopes, wire shapes
//! - [`client`] - `GraphqlCartBackend` (reqwest)
//! - [`auth`] - Credential and redirect collaborators
//!
//! ### Ambient
//! - [`config`] - Layered configuration
//! - [`error`] - Sync error types
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_sync::{
//!     CartSync, GraphqlCartBackend, LogOnlyRedirect, SessionCredentials, StorefrontConfig,
//! };
//!
//! let config = StorefrontConfig::load_or_default(None);
//! let backend = Arc::new(GraphqlCartBackend::new(&config)?);
//! let session = Arc::new(SessionCredentials::new());
//!
//! let cart = CartSync::new(backend, session, Arc::new(LogOnlyRedirect), &config)?;
//! cart.hydrate().await?;
//!
//! let reader = cart.reader();
//! println!("Items: {}", reader.summary().total_item_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod logging;
pub mod machine;
pub mod poller;
pub mod reader;
pub mod sequence;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthRedirect, Credential, CredentialSource, LogOnlyRedirect, SessionCredentials};
pub use backend::CartBackend;
pub use client::GraphqlCartBackend;
pub use config::{ApiSettings, BadgeSettings, StorefrontConfig};
pub use error::{BackendError, BackendResult, SyncError, SyncResult};
pub use logging::init_tracing;
pub use machine::{CartSync, ClearConfirmed};
pub use poller::{ItemCountPoller, ItemCountPollerHandle};
pub use reader::CartReader;
pub use sequence::{SequenceTracker, Ticket};
