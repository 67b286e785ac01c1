//! Routing table membership, driven by the host's connection lifecycle notifications.
//!
//! A peer is admitted to the routing table once it is known to speak one of our DHT protocols,
//! either from the peerstore's cache or by probing the connection, and evicted when its last
//! connection closes. Per peer, this amounts to:
//!
//! ```text
//! Unknown --connected, cached support--------------------------> Member
//! Unknown --connected, no cached support--> ProbeInFlight --ok--> Member
//!                                                         --err-> NotMember
//! Member  --disconnected---------------------------------------> NotMember
//! ```
//!
//! Notifications for one connection arrive in order, but the probe and the disconnect of the same
//! peer run concurrently. Every decision is therefore re-checked against the host's current
//! connectedness under the lifecycle lock before the routing table is touched.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    config::Config,
    core::{
        id::PeerId,
        traits::{Connectedness, Connection, Host, Negotiator, Notifiee, RoutingTable},
    },
    probe::Prober,
    protect::{should_protect, PROTECTION_TAG},
    refresh::{RefreshTrigger, MIN_REFRESH_THRESHOLD},
};

pub mod streams;

use streams::StreamMap;

/// Admits peers to and evicts peers from the routing table as connections come and go.
///
/// Cheap to clone, clones share their state. The notification handlers spawn tasks and must be
/// called from within a tokio runtime.
#[derive(Clone)]
pub struct MembershipController {
    inner: Arc<Inner>,
}

struct Inner {
    local_id: PeerId,
    config: Arc<Config>,
    host: Host,
    routing_table: Arc<dyn RoutingTable>,
    prober: Prober,
    refresh: RefreshTrigger,
    streams: Arc<StreamMap>,
    // Guards routing table mutations and the decisions leading to them. Never held across I/O.
    lifecycle: Mutex<()>,
    shutdown: CancellationToken,
}

impl MembershipController {
    /// Creates a controller for the node `local_id`; once `shutdown` is cancelled, notifications
    /// are ignored.
    pub fn new(
        local_id: PeerId,
        config: Arc<Config>,
        host: Host,
        routing_table: Arc<dyn RoutingTable>,
        negotiator: Arc<dyn Negotiator>,
        refresh: RefreshTrigger,
        shutdown: CancellationToken,
    ) -> Self {
        let prober = Prober::new(
            negotiator,
            Arc::clone(&host.peerstore),
            config.protocols(),
        );

        Self {
            inner: Arc::new(Inner {
                local_id,
                config,
                host,
                routing_table,
                prober,
                refresh,
                streams: Arc::new(StreamMap::new()),
                lifecycle: Mutex::new(()),
                shutdown,
            }),
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.inner.local_id
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.inner.config
    }

    /// The cached message senders, invalidated here when their peer disconnects.
    pub fn streams(&self) -> &Arc<StreamMap> {
        &self.inner.streams
    }
}

impl Notifiee for MembershipController {
    fn connected(&self, conn: Arc<dyn Connection>) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return;
        }

        let peer = conn.remote_peer();
        if inner.supports_dht(&peer) {
            // Connect notifications are serialized already, the lock keeps this path consistent
            // with the probing one.
            let _guard = inner.lifecycle.lock();
            inner.admit_if_connected(peer);
            return;
        }

        // The peerstore may not know yet that the peer is a DHT server. The probe is network I/O
        // and can't hold up the delivery of other notifications.
        let inner = Arc::clone(inner);
        tokio::spawn(async move { inner.test_connection(conn).await });
    }

    fn disconnected(&self, conn: Arc<dyn Connection>) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return;
        }

        let peer = conn.remote_peer();

        // Scope the lock.
        {
            let _guard = inner.lifecycle.lock();
            if inner.host.network.connectedness(&peer) == Connectedness::Connected {
                trace!(%peer, "ignoring stale disconnect, the peer reconnected");
                return;
            }

            inner.routing_table.remove(&peer);
            inner.host.conn_manager.unprotect(&peer, PROTECTION_TAG);
            debug!(%peer, "peer evicted from the routing table");

            if inner.routing_table.size() < MIN_REFRESH_THRESHOLD {
                // Only peers already known to speak the protocol, probing happens on connect.
                for other in inner.host.network.peers() {
                    if inner.supports_dht(&other) {
                        inner.admit(other);
                    }
                }
            }
        }

        let sender = match inner.streams.remove(&peer) {
            Some(sender) => sender,
            None => return,
        };

        // The sender's lock is held for the duration of a send, don't wait for it here.
        tokio::spawn(async move {
            sender.lock().await.invalidate();
            trace!(peer = %sender.peer(), "message sender invalidated");
        });
    }
}

impl Inner {
    // Checks the peerstore's cache, a lookup error counts as no support.
    fn supports_dht(&self, peer: &PeerId) -> bool {
        matches!(
            self.host
                .peerstore
                .supports_protocols(peer, self.prober.protocols()),
            Ok(protocols) if !protocols.is_empty()
        )
    }

    async fn test_connection(&self, conn: Arc<dyn Connection>) {
        if self.prober.probe(conn.as_ref()).await.is_none() {
            return;
        }

        // We race with the disconnect. Without the lock, the connect could be processed after the
        // associated disconnect and add the peer back after its removal.
        let _guard = self.lifecycle.lock();
        self.admit_if_connected(conn.remote_peer());
    }

    // Expects the lifecycle lock to be held.
    fn admit_if_connected(&self, peer: PeerId) {
        if self.host.network.connectedness(&peer) != Connectedness::Connected {
            trace!(%peer, "ignoring stale connect, the peer disconnected");
            return;
        }

        let size_before_update = self.routing_table.size();
        self.admit(peer);
        self.refresh.maybe_signal(size_before_update, &self.config);
    }

    // Expects the lifecycle lock to be held.
    fn admit(&self, peer: PeerId) -> bool {
        if !(self.config.routing_table().peer_filter())(&peer) {
            trace!(%peer, "peer rejected by the routing table filter");
            return false;
        }

        if !self.routing_table.update(peer) {
            return false;
        }

        let cpl = self.local_id.common_prefix_len(&peer);
        if should_protect(cpl, &self.config) {
            self.host.conn_manager.protect(&peer, PROTECTION_TAG);
        }

        debug!(%peer, cpl, "peer admitted to the routing table");
        true
    }
}
