//! Routing table membership maintenance for Kademlia DHT nodes.
//!
//! This crate decides which of the peers a node is connected to belong in its routing table, and
//! holds the query parameters its lookups run with. It sits between a host (transport,
//! peerstore, connection manager) and a routing table, both supplied by the embedding node
//! through the traits in [`traits`].
//!
//! ## Membership
//!
//! The [`MembershipController`](membership::MembershipController) receives the host's
//! connection notifications. A connected peer known to speak one of the node's DHT protocols is
//! admitted straight away; otherwise the connection is probed in the background. A disconnected
//! peer is evicted, its connection unprotected and its cached message sender invalidated. When
//! the table runs low, a refresh is requested over a single-slot channel (see [`refresh`]).
//!
//! ## Configuration
//!
//! A [`Config`] is built once from [`options`](config::options) and shared read-only. Networks
//! using the reserved [`DEFAULT_PREFIX`](config::DEFAULT_PREFIX) must keep the default bucket
//! size, providers, values and record validators.
//!
//! ## Lookups
//!
//! [`CandidateSelector`](cost::CandidateSelector) ranks lookup candidates either by XOR distance
//! or, with latency consideration enabled, by estimated time to convergence.

#![cfg_attr(doc_cfg, feature(doc_cfg))]

#[cfg(feature = "codec")]
#[cfg_attr(doc_cfg, doc(cfg(feature = "codec")))]
pub mod codec;
pub mod config;
pub mod cost;
pub mod membership;
pub mod probe;
pub mod protect;
pub mod refresh;

mod core;

pub use crate::{
    config::{Config, ConfigError},
    core::{
        datastore::{Datastore, MemoryDatastore},
        id::{PeerId, PeerInfo},
        protocol::ProtocolId,
        traits,
    },
};
