use std::{
    collections::{HashMap, HashSet},
    io,
    sync::Arc,
};

use async_trait::async_trait;
use kadwatch::{
    config::DhtOption,
    membership::MembershipController,
    refresh::{refresh_channel, RefreshRequests},
    traits::{
        ConnManager, Connectedness, Connection, Host, Negotiator, Network, Peerstore,
        RoutingTable, Stream,
    },
    Config, PeerId, ProtocolId,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[allow(dead_code)]
pub fn enable_tracing() {
    fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

/// The local node's identifier in every test, peers differing in the first bit land in bucket 0.
#[allow(dead_code)]
pub fn local_id() -> PeerId {
    PeerId::new([0u8; PeerId::BYTES])
}

/// An identifier sharing exactly `cpl` leading bits with [`local_id`], `salt` tells peers in the
/// same bucket apart.
#[allow(dead_code)]
pub fn peer_with_cpl(cpl: u32, salt: u16) -> PeerId {
    let mut bytes = PeerId::from_u16(salt).bytes();
    let byte = (cpl / 8) as usize;
    bytes[byte] |= 0b1000_0000 >> (cpl % 8);

    PeerId::new(bytes)
}

#[allow(dead_code)]
#[derive(Default)]
pub struct MockNetwork {
    connected: Mutex<HashSet<PeerId>>,
}

#[allow(dead_code)]
impl MockNetwork {
    pub fn connect(&self, peer: PeerId) {
        self.connected.lock().insert(peer);
    }

    pub fn disconnect(&self, peer: &PeerId) {
        self.connected.lock().remove(peer);
    }
}

impl Network for MockNetwork {
    fn connectedness(&self, peer: &PeerId) -> Connectedness {
        if self.connected.lock().contains(peer) {
            Connectedness::Connected
        } else {
            Connectedness::NotConnected
        }
    }

    fn peers(&self) -> Vec<PeerId> {
        self.connected.lock().iter().copied().collect()
    }
}

#[derive(Default)]
pub struct MockPeerstore {
    protocols: Mutex<HashMap<PeerId, HashSet<ProtocolId>>>,
}

impl MockPeerstore {
    pub fn knows(&self, peer: &PeerId, protocol: &ProtocolId) -> bool {
        self.protocols
            .lock()
            .get(peer)
            .map_or(false, |protocols| protocols.contains(protocol))
    }
}

impl Peerstore for MockPeerstore {
    fn supports_protocols(
        &self,
        peer: &PeerId,
        protocols: &[ProtocolId],
    ) -> io::Result<Vec<ProtocolId>> {
        let known = self.protocols.lock();
        let supported = match known.get(peer) {
            Some(supported) => supported,
            None => return Ok(vec![]),
        };

        Ok(protocols
            .iter()
            .filter(|p| supported.contains(*p))
            .cloned()
            .collect())
    }

    fn add_protocols(&self, peer: &PeerId, protocols: &[ProtocolId]) -> io::Result<()> {
        self.protocols
            .lock()
            .entry(*peer)
            .or_default()
            .extend(protocols.iter().cloned());

        Ok(())
    }
}

#[allow(dead_code)]
#[derive(Default)]
pub struct MockConnManager {
    protected: Mutex<HashMap<PeerId, HashSet<String>>>,
}

#[allow(dead_code)]
impl MockConnManager {
    pub fn is_protected(&self, peer: &PeerId, tag: &str) -> bool {
        self.protected
            .lock()
            .get(peer)
            .map_or(false, |tags| tags.contains(tag))
    }
}

impl ConnManager for MockConnManager {
    fn protect(&self, peer: &PeerId, tag: &str) {
        self.protected
            .lock()
            .entry(*peer)
            .or_default()
            .insert(tag.to_owned());
    }

    fn unprotect(&self, peer: &PeerId, tag: &str) -> bool {
        let mut protected = self.protected.lock();
        let tags = match protected.get_mut(peer) {
            Some(tags) => tags,
            None => return false,
        };

        tags.remove(tag);
        if tags.is_empty() {
            protected.remove(peer);
            return false;
        }

        true
    }
}

#[allow(dead_code)]
#[derive(Default)]
pub struct MockRoutingTable {
    peers: Mutex<HashSet<PeerId>>,
    updates: Mutex<Vec<PeerId>>,
}

#[allow(dead_code)]
impl MockRoutingTable {
    /// Fills the table with `n` random peers.
    pub fn fill(&self, n: usize) {
        let mut peers = self.peers.lock();
        while peers.len() < n {
            peers.insert(PeerId::rand());
        }
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.lock().contains(peer)
    }

    /// The peers passed to `update`, in order.
    pub fn updates(&self) -> Vec<PeerId> {
        self.updates.lock().clone()
    }
}

impl RoutingTable for MockRoutingTable {
    fn update(&self, peer: PeerId) -> bool {
        self.updates.lock().push(peer);
        self.peers.lock().insert(peer);

        true
    }

    fn remove(&self, peer: &PeerId) {
        self.peers.lock().remove(peer);
    }

    fn size(&self) -> usize {
        self.peers.lock().len()
    }
}

/// Accepts the first proposed protocol, or rejects them all.
#[allow(dead_code)]
pub struct MockNegotiator {
    accept: bool,
}

#[async_trait]
impl Negotiator for MockNegotiator {
    async fn select_one_of(
        &self,
        protocols: &[ProtocolId],
        _stream: &mut dyn Stream,
    ) -> io::Result<ProtocolId> {
        match protocols.first() {
            Some(protocol) if self.accept => Ok(protocol.clone()),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no protocol in common",
            )),
        }
    }
}

#[allow(dead_code)]
pub struct MockConnection {
    peer: PeerId,
    // Whether opening a stream fails.
    broken: bool,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new(peer: PeerId) -> Arc<dyn Connection> {
        Arc::new(Self {
            peer,
            broken: false,
        })
    }

    #[allow(dead_code)]
    pub fn broken(peer: PeerId) -> Arc<dyn Connection> {
        Arc::new(Self { peer, broken: true })
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn remote_peer(&self) -> PeerId {
        self.peer
    }

    async fn new_stream(&self) -> io::Result<Box<dyn Stream>> {
        if self.broken {
            return Err(io::ErrorKind::ConnectionReset.into());
        }

        // The remote half is dropped, reads see EOF straight away.
        let (stream, _remote) = tokio::io::duplex(1024);
        Ok(Box::new(stream))
    }
}

/// A membership controller wired to mock collaborators.
#[allow(dead_code)]
pub struct TestNode {
    pub controller: MembershipController,
    pub network: Arc<MockNetwork>,
    pub peerstore: Arc<MockPeerstore>,
    pub conn_manager: Arc<MockConnManager>,
    pub routing_table: Arc<MockRoutingTable>,
    pub refresh_requests: RefreshRequests,
    pub shutdown: CancellationToken,
}

#[allow(dead_code)]
impl TestNode {
    pub fn new(options: Vec<DhtOption>, negotiation_succeeds: bool) -> Self {
        let network = Arc::new(MockNetwork::default());
        let peerstore = Arc::new(MockPeerstore::default());
        let conn_manager = Arc::new(MockConnManager::default());
        let routing_table = Arc::new(MockRoutingTable::default());

        let peerstore_handle: Arc<dyn Peerstore> = peerstore.clone();
        let config = Config::build(options, &peerstore_handle).unwrap();

        let (refresh, refresh_requests) = refresh_channel();
        let shutdown = CancellationToken::new();

        let controller = MembershipController::new(
            local_id(),
            config,
            Host {
                network: network.clone(),
                peerstore: peerstore_handle,
                conn_manager: conn_manager.clone(),
            },
            routing_table.clone(),
            Arc::new(MockNegotiator {
                accept: negotiation_succeeds,
            }),
            refresh,
            shutdown.clone(),
        );

        Self {
            controller,
            network,
            peerstore,
            conn_manager,
            routing_table,
            refresh_requests,
            shutdown,
        }
    }

    /// The DHT protocol this node speaks.
    pub fn protocol(&self) -> ProtocolId {
        self.controller.config().protocols()[0].clone()
    }

    /// Records in the peerstore that the peer speaks the DHT protocol.
    pub fn cache_support(&self, peer: &PeerId) {
        self.peerstore.add_protocols(peer, &[self.protocol()]).unwrap();
    }
}
