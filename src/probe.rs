//! Protocol compatibility probing.

use std::{sync::Arc, time::Duration};

use tokio::{io::AsyncWriteExt, time::timeout};
use tracing::{debug, trace};

use crate::core::{
    protocol::ProtocolId,
    traits::{Connection, Negotiator, Peerstore, Stream},
};

/// How long a probe stream is drained for after its write half is closed.
const FULL_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Finds out whether a connected peer speaks one of our DHT protocols.
#[derive(Clone)]
pub struct Prober {
    negotiator: Arc<dyn Negotiator>,
    peerstore: Arc<dyn Peerstore>,
    protocols: Vec<ProtocolId>,
}

impl Prober {
    /// Creates a prober offering `protocols`, in order of preference.
    pub fn new(
        negotiator: Arc<dyn Negotiator>,
        peerstore: Arc<dyn Peerstore>,
        protocols: Vec<ProtocolId>,
    ) -> Self {
        Self {
            negotiator,
            peerstore,
            protocols,
        }
    }

    pub fn protocols(&self) -> &[ProtocolId] {
        &self.protocols
    }

    /// Negotiates over a new stream on `conn` and returns the protocol the peer agreed to.
    ///
    /// The stream is opened on this exact connection: with two connections to the same peer,
    /// probing "any" connection could test one twice, or race against it closing and leave the
    /// other untested. A failure to open the stream or to agree on a protocol both mean the peer
    /// doesn't participate and return `None`. The agreed protocol is recorded in the peerstore so
    /// later connections can skip the negotiation.
    pub async fn probe(&self, conn: &dyn Connection) -> Option<ProtocolId> {
        let peer = conn.remote_peer();

        let mut stream = match conn.new_stream().await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(%peer, "couldn't open a probe stream: {e}");
                return None;
            }
        };

        let res = self
            .negotiator
            .select_one_of(&self.protocols, &mut *stream)
            .await;

        // Courtesy to the remote, done in the background as draining can take a while.
        tokio::spawn(full_close(stream));

        match res {
            Ok(selected) => {
                trace!(%peer, protocol = %selected, "peer speaks the dht protocol");

                if let Err(e) = self
                    .peerstore
                    .add_protocols(&peer, std::slice::from_ref(&selected))
                {
                    debug!(%peer, "couldn't record the negotiated protocol: {e}");
                }

                Some(selected)
            }
            Err(e) => {
                trace!(%peer, "peer doesn't speak the dht protocol: {e}");
                None
            }
        }
    }
}

// Closes the write half and drains the read half until the remote closes its own.
async fn full_close(mut stream: Box<dyn Stream>) {
    if stream.shutdown().await.is_err() {
        return;
    }

    let _ = timeout(
        FULL_CLOSE_TIMEOUT,
        tokio::io::copy(&mut stream, &mut tokio::io::sink()),
    )
    .await;
}
