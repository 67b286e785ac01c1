//! The collaborators the membership logic is driven by and acts upon.
//!
//! Kadwatch doesn't implement a transport, a peerstore or a bucket data structure; the node
//! embedding it provides them through these traits.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::{id::PeerId, protocol::ProtocolId};

/// Whether the host currently holds at least one live connection to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectedness {
    Connected,
    NotConnected,
}

/// A bidirectional byte stream multiplexed over a [`Connection`].
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// A live transport-level link to a remote peer.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The identity of the peer at the other end of this link.
    fn remote_peer(&self) -> PeerId;

    /// Opens a new stream on *this* connection (not on any connection to the remote peer).
    async fn new_stream(&self) -> io::Result<Box<dyn Stream>>;
}

/// The host's view of its connections.
pub trait Network: Send + Sync {
    fn connectedness(&self, peer: &PeerId) -> Connectedness;

    /// Returns the peers the host is currently connected to.
    fn peers(&self) -> Vec<PeerId>;
}

/// Cached facts about remote peers.
pub trait Peerstore: Send + Sync {
    /// Returns the subset of `protocols` the peer is known to support.
    fn supports_protocols(
        &self,
        peer: &PeerId,
        protocols: &[ProtocolId],
    ) -> io::Result<Vec<ProtocolId>>;

    /// Records that the peer supports `protocols`.
    fn add_protocols(&self, peer: &PeerId, protocols: &[ProtocolId]) -> io::Result<()>;
}

/// Marks connections as exempt from pruning by the host's connection manager.
pub trait ConnManager: Send + Sync {
    fn protect(&self, peer: &PeerId, tag: &str);

    /// Removes the protection under `tag`, returns `true` if the peer is still protected under
    /// another tag. Unprotecting a peer that isn't protected is a no-op.
    fn unprotect(&self, peer: &PeerId, tag: &str) -> bool;
}

/// The Kademlia routing table, as seen by the membership logic.
pub trait RoutingTable: Send + Sync {
    /// Admits or refreshes the peer, returns `true` if it is in the table afterwards.
    fn update(&self, peer: PeerId) -> bool;

    fn remove(&self, peer: &PeerId);

    fn size(&self) -> usize;
}

/// Agrees on a single application protocol over a freshly opened stream.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Proposes `protocols` in order and returns the one the remote side accepted. An error of
    /// kind [`io::ErrorKind::Unsupported`] signals that none were accepted.
    async fn select_one_of(
        &self,
        protocols: &[ProtocolId],
        stream: &mut dyn Stream,
    ) -> io::Result<ProtocolId>;
}

/// Receives the host's connection lifecycle notifications.
///
/// Notifications for the same connection are delivered in order, the handlers must return
/// promptly as a slow handler stalls delivery for every other connection.
pub trait Notifiee: Send + Sync {
    fn connected(&self, conn: Arc<dyn Connection>);

    fn disconnected(&self, conn: Arc<dyn Connection>);

    /// Called when a stream is opened; the provided implementation is a no-op.
    fn opened_stream(&self, _peer: &PeerId) {}

    /// Called when a stream is closed; the provided implementation is a no-op.
    fn closed_stream(&self, _peer: &PeerId) {}

    /// Called when the host starts listening on an address; the provided implementation is a
    /// no-op.
    fn listen(&self, _addr: SocketAddr) {}

    /// Called when the host stops listening on an address; the provided implementation is a
    /// no-op.
    fn listen_close(&self, _addr: SocketAddr) {}
}

/// The host services consulted by the membership logic.
#[derive(Clone)]
pub struct Host {
    pub network: Arc<dyn Network>,
    pub peerstore: Arc<dyn Peerstore>,
    pub conn_manager: Arc<dyn ConnManager>,
}
