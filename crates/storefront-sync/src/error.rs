//! # Sync Error Types
//!
//! Error types for cart sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Backend       │  │     Session             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Rejected       │  │  Unauthenticated        │ │
//! │  │  InvalidUrl     │  │  Unauthorized   │  │  (redirected locally)   │ │
//! │  │  ConfigLoad...  │  │  Transport      │  │                         │ │
//! │  │                 │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Local cart rules arrive as SyncError::Core(CoreError) and never       │
//! │  touch the network or the rendered state.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use storefront_core::CoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

// =============================================================================
// Backend Error
// =============================================================================

/// Failures reported by (or on the way to) the GraphQL backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Business-rule failure, e.g. stock exceeded or invalid quantity.
    #[error("{message}")]
    Rejected { code: String, message: String },

    /// Expired or missing credential, as judged by the server.
    #[error("Your session has expired. Please sign in again.")]
    Unauthorized,

    /// Network-level failure. Retryable.
    #[error("Network error: {0}")]
    Transport(String),

    /// No response within the configured bound.
    #[error("Request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The server answered with something we could not use.
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Creates a rejection with a machine-readable code.
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Timeout(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidResponse(err.to_string())
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Errors returned by cart operations and sync setup.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Session Errors
    // =========================================================================
    /// No credential; the caller was sent to sign in.
    #[error("Sign in to use your cart")]
    Unauthenticated,

    // =========================================================================
    // Cart Errors
    // =========================================================================
    /// A local cart rule rejected the operation before any request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backend rejected or failed the request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid GraphQL endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<storefront_core::ValidationError> for SyncError {
    fn from(err: storefront_core::ValidationError) -> Self {
        SyncError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Backend(BackendError::from(err))
    }
}
