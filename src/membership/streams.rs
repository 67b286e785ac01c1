//! Cached outbound message streams, one per peer.

use std::{collections::HashMap, io, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::core::{id::PeerId, traits::Stream};

/// The usable state of a cached stream.
#[derive(Default)]
pub struct SenderState {
    stream: Option<Box<dyn Stream>>,
    invalidated: bool,
}

impl SenderState {
    /// Drops the stream and marks the sender unusable; its peer disconnected.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
        self.stream = None;
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn stream(&mut self) -> Option<&mut (dyn Stream + 'static)> {
        self.stream.as_deref_mut()
    }

    /// Caches a freshly opened stream, fails if the sender was invalidated in the meantime.
    pub fn set_stream(&mut self, stream: Box<dyn Stream>) -> io::Result<()> {
        if self.invalidated {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "message sender was invalidated",
            ));
        }

        self.stream = Some(stream);
        Ok(())
    }
}

/// A per-peer outbound message channel.
///
/// Its lock is held for the duration of a send, which can take a while.
pub struct MessageSender {
    peer: PeerId,
    state: AsyncMutex<SenderState>,
}

impl MessageSender {
    fn new(peer: PeerId) -> Self {
        Self {
            peer,
            state: AsyncMutex::new(SenderState::default()),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub async fn lock(&self) -> MutexGuard<'_, SenderState> {
        self.state.lock().await
    }
}

/// Maps peers to their cached [`MessageSender`].
///
/// The map's lock only covers insertion and removal, never a sender's own lock.
#[derive(Default)]
pub struct StreamMap {
    senders: Mutex<HashMap<PeerId, Arc<MessageSender>>>,
}

impl StreamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the peer's sender, creating it if there is none.
    pub fn sender(&self, peer: PeerId) -> Arc<MessageSender> {
        Arc::clone(
            self.senders
                .lock()
                .entry(peer)
                .or_insert_with(|| Arc::new(MessageSender::new(peer))),
        )
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.senders.lock().contains_key(peer)
    }

    /// Removes and returns the peer's sender.
    pub fn remove(&self, peer: &PeerId) -> Option<Arc<MessageSender>> {
        self.senders.lock().remove(peer)
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_cached() {
        let streams = StreamMap::new();
        let peer = PeerId::from_u16(1);

        let a = streams.sender(peer);
        let b = streams.sender(peer);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.peer(), peer);
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn remove() {
        let streams = StreamMap::new();
        let peer = PeerId::from_u16(1);

        assert!(streams.remove(&peer).is_none());

        streams.sender(peer);
        assert!(streams.contains(&peer));
        assert!(streams.remove(&peer).is_some());
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn invalidate_drops_stream() {
        let streams = StreamMap::new();
        let sender = streams.sender(PeerId::from_u16(1));

        let (stream, _remote) = tokio::io::duplex(64);

        let mut state = sender.lock().await;
        assert!(state.set_stream(Box::new(stream)).is_ok());
        assert!(state.stream().is_some());

        state.invalidate();
        assert!(state.is_invalidated());
        assert!(state.stream().is_none());

        let (stream, _remote) = tokio::io::duplex(64);
        let err = state.set_stream(Box::new(stream)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
