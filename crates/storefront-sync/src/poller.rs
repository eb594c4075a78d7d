//! # Cart Badge Poller
//!
//! Keeps the header badge close to the server's item count without pulling
//! the whole cart.
//!
//! ## Poll Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ItemCountPoller                                   │
//! │                                                                         │
//! │   ┌──────────┐   signed out   ┌────────────────┐                        │
//! │   │  wake    │───────────────►│ publish 0      │── no request          │
//! │   └────┬─────┘                └────────────────┘                        │
//! │        │ signed in                                                      │
//! │        ▼                                                                │
//! │   fetch_item_count ── OK ──► publish count, reset backoff,             │
//! │        │                     sleep poll_interval                       │
//! │        │                                                                │
//! │        ├── transport / timeout ──► sleep next_backoff()                │
//! │        │                          (initial_backoff → max_backoff)      │
//! │        │                                                                │
//! │        └── other error ──► log, sleep poll_interval                    │
//! │                                                                         │
//! │   Shutdown is honoured while sleeping and between polls.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The poller only publishes a count. Cart lines belong to [`crate::CartSync`].

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::auth::CredentialSource;
use crate::backend::CartBackend;
use crate::config::StorefrontConfig;
use crate::error::{BackendError, BackendResult, SyncError, SyncResult};

// =============================================================================
// Poller
// =============================================================================

/// Background task publishing the cart item count.
pub struct ItemCountPoller {
    backend: Arc<dyn CartBackend>,
    credentials: Arc<dyn CredentialSource>,

    /// Delay between successful polls.
    poll_interval: Duration,

    /// Bound for a single count request.
    request_timeout: Duration,

    /// Delay schedule after retryable failures.
    backoff: ExponentialBackoff,

    badge_tx: watch::Sender<i64>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for reading the badge and stopping the poller.
#[derive(Clone)]
pub struct ItemCountPollerHandle {
    badge_rx: watch::Receiver<i64>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ItemCountPollerHandle {
    /// Subscribes to badge updates.
    pub fn badge(&self) -> watch::Receiver<i64> {
        self.badge_rx.clone()
    }

    /// Latest published count.
    pub fn count(&self) -> i64 {
        *self.badge_rx.borrow()
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl ItemCountPoller {
    /// Creates a poller and returns a handle.
    pub fn new(
        backend: Arc<dyn CartBackend>,
        credentials: Arc<dyn CredentialSource>,
        config: &StorefrontConfig,
    ) -> SyncResult<(Self, ItemCountPollerHandle)> {
        config.validate()?;
        let (badge_tx, badge_rx) = watch::channel(0);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let poller = ItemCountPoller {
            backend,
            credentials,
            poll_interval: config.poll_interval(),
            request_timeout: config.request_timeout(),
            backoff: create_backoff(config),
            badge_tx,
            shutdown_rx,
        };

        let handle = ItemCountPollerHandle {
            badge_rx,
            shutdown_tx,
        };

        Ok((poller, handle))
    }

    /// Runs the poll loop. The first poll happens immediately.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.poll_interval, "Item count poller starting");

        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}

                _ = self.shutdown_rx.recv() => {
                    info!("Item count poller shutting down");
                    break;
                }
            }

            delay = match self.poll_once().await {
                Ok(()) => {
                    self.backoff.reset();
                    self.poll_interval
                }
                Err(e) if e.is_retryable() => {
                    let wait = self.backoff.next_backoff().unwrap_or(self.poll_interval);
                    warn!(error = %e, ?wait, "Item count poll failed, backing off");
                    wait
                }
                Err(e) => {
                    warn!(error = %e, "Item count poll failed");
                    self.poll_interval
                }
            };
        }

        info!("Item count poller stopped");
    }

    async fn poll_once(&mut self) -> BackendResult<()> {
        let Some(credential) = self.credentials.credential() else {
            debug!("No session, badge shows 0");
            self.publish(0);
            return Ok(());
        };

        let request = self.backend.fetch_item_count(&credential);
        let result = match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.request_timeout)),
        };

        match result {
            Ok(count) => {
                debug!(count, "Item count polled");
                self.publish(count.max(0));
                Ok(())
            }
            Err(BackendError::Unauthorized) => {
                self.publish(0);
                Err(BackendError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    fn publish(&self, count: i64) {
        self.badge_tx.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
    }
}

fn create_backoff(config: &StorefrontConfig) -> ExponentialBackoff {
    let mut backoff = ExponentialBackoff {
        initial_interval: config.initial_backoff(),
        max_interval: config.max_backoff(),
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    };
    backoff.reset();
    backoff
}
