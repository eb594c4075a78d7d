//! # Authentication Collaborators
//!
//! The cart core never stores or refreshes credentials itself. It asks a
//! [`CredentialSource`] for the current bearer token and hands sign-in
//! problems to an [`AuthRedirect`].
//!
//! ## Guard Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Mutating Cart Operation                            │
//! │                                                                         │
//! │  credentials.credential()                                              │
//! │        │                                                                │
//! │        ├── None ──► redirect.redirect_to_login()   (exactly once)      │
//! │        │            return SyncError::Unauthenticated, lines untouched │
//! │        │                                                                │
//! │        └── Some(token) ──► request with Authorization: Bearer <token>  │
//! │                                   │                                     │
//! │                                   ├── 401/403 ──► redirect.session_    │
//! │                                   │               expired()            │
//! │                                   └── OK                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::RwLock;

use tracing::{debug, info};

// =============================================================================
// Credential
// =============================================================================

/// A bearer credential. `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    /// Returns the raw token for the `Authorization` header.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Supplies the current session's credential, if signed in.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<Credential>;

    fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }
}

/// Sends the shopper to the authentication entry point.
pub trait AuthRedirect: Send + Sync {
    /// The shopper tried a cart operation without signing in.
    fn redirect_to_login(&self);

    /// The server rejected the credential; stale session state must go.
    fn session_expired(&self);
}

/// Redirect that only logs, for headless use and tests.
pub struct LogOnlyRedirect;

impl AuthRedirect for LogOnlyRedirect {
    fn redirect_to_login(&self) {
        info!("Cart operation requires sign-in");
    }

    fn session_expired(&self) {
        info!("Cart session expired");
    }
}

// =============================================================================
// Session Credentials
// =============================================================================

/// Session-scoped, in-memory credential holder.
///
/// The identity provider exchange happens elsewhere; the result is handed
/// in through [`SessionCredentials::sign_in`].
#[derive(Default)]
pub struct SessionCredentials {
    current: RwLock<Option<Credential>>,
}

impl SessionCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a holder that is already signed in.
    pub fn signed_in(credential: Credential) -> Self {
        SessionCredentials {
            current: RwLock::new(Some(credential)),
        }
    }

    pub fn sign_in(&self, credential: Credential) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(credential);
        debug!("Session credential stored");
    }

    pub fn sign_out(&self) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        debug!("Session credential cleared");
    }
}

impl CredentialSource for SessionCredentials {
    fn credential(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
