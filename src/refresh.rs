//! Routing table refresh signalling.
//!
//! The refresh itself is carried out elsewhere; this module only decides when to ask for one and
//! coalesces the requests so at most one is pending at any time.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

use crate::config::Config;

/// A routing table at or below this size (measured before a peer is admitted) asks for a refresh.
pub const MIN_REFRESH_THRESHOLD: usize = 20;

/// Creates the refresh request channel, it holds a single pending request.
pub fn refresh_channel() -> (RefreshTrigger, RefreshRequests) {
    let (tx, rx) = mpsc::channel(1);

    (RefreshTrigger { tx }, RefreshRequests { rx })
}

/// The sending half of the refresh request channel.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: mpsc::Sender<()>,
}

impl RefreshTrigger {
    /// Returns whether a table of `size_before_update` peers is sparse enough to be refreshed.
    ///
    /// Evaluated on the size before the admission, so a refresh may be requested one peer past
    /// the threshold, but never missed.
    pub fn needs_refresh(size_before_update: usize) -> bool {
        size_before_update <= MIN_REFRESH_THRESHOLD
    }

    /// Requests a refresh without blocking. Returns `true` if the request was enqueued, `false` if
    /// one was already pending (or the consumer is gone) and this one was dropped.
    pub fn signal(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                trace!("routing table refresh requested");
                true
            }
            Err(TrySendError::Full(())) => {
                trace!("routing table refresh already pending");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }

    /// Requests a refresh if auto-refresh is enabled and the table was sparse before the update.
    pub fn maybe_signal(&self, size_before_update: usize, config: &Config) -> bool {
        if !config.routing_table().auto_refresh() {
            return false;
        }

        Self::needs_refresh(size_before_update) && self.signal()
    }
}

/// The receiving half of the refresh request channel, drained by the refresh executor.
#[derive(Debug)]
pub struct RefreshRequests {
    rx: mpsc::Receiver<()>,
}

impl RefreshRequests {
    /// Waits for the next refresh request, returns `None` once every trigger is dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Takes the pending refresh request, if any.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
