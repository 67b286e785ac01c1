//! Construction-time options.
//!
//! Each option sets exactly one field and never fails, [`namespaced_validator`] excepted.

use std::{sync::Arc, time::Duration};

use crate::{
    config::{Config, ConfigError, DhtOption, ModeOpt, Validator},
    core::{
        datastore::Datastore,
        id::{PeerId, PeerInfo},
        protocol::ProtocolId,
    },
};

/// Sets the maximum acceptable latency for peers in the routing table.
pub fn routing_table_latency_tolerance(latency: Duration) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.routing_table.latency_tolerance = latency;
        Ok(())
    })
}

/// Sets the timeout for routing table refresh queries.
pub fn routing_table_refresh_query_timeout(timeout: Duration) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.routing_table.refresh_query_timeout = timeout;
        Ok(())
    })
}

/// Sets the period for refreshing the buckets of the routing table.
pub fn routing_table_refresh_period(period: Duration) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.routing_table.refresh_interval = period;
        Ok(())
    })
}

/// Sets the record store backend. Defaults to an in-memory map.
pub fn datastore(datastore: Arc<dyn Datastore>) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.datastore = datastore;
        Ok(())
    })
}

pub fn mode(mode: ModeOpt) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.mode = mode;
        Ok(())
    })
}

/// Replaces the record validator.
///
/// The default is a namespaced validator for public key (`pk`) and naming (`ipns`) records.
/// Replacing it means the user controls validation, and those defaults are no longer added.
pub fn validator(validator: Validator) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.validator = validator;
        c.validator_changed = true;
        Ok(())
    })
}

/// Registers `validator` for records whose keys start with `/<namespace>/`.
///
/// Fails if the current validator isn't namespaced. Without a prior [`validator`] option, the
/// namespace is added alongside the default `pk` and `ipns` validators; registering `pk` or
/// `ipns` here takes precedence over those defaults.
pub fn namespaced_validator(namespace: impl Into<String>, validator: Validator) -> DhtOption {
    let namespace = namespace.into();

    Box::new(move |c: &mut Config| match &mut c.validator {
        Validator::Namespaced(namespaces) => {
            namespaces.insert(namespace, validator);
            Ok(())
        }
        _ => Err(ConfigError::NotNamespaced),
    })
}

/// Sets the application specific prefix of all DHT protocols, e.g. `/myapp` for
/// `/myapp/kad/1.0.0`.
pub fn protocol_prefix(prefix: impl Into<ProtocolId>) -> DhtOption {
    let prefix = prefix.into();

    Box::new(move |c: &mut Config| {
        c.protocol_prefix = prefix;
        Ok(())
    })
}

/// Appends to the protocol prefix, e.g. `/lan` for `/ipfs/lan/kad/1.0.0`.
pub fn protocol_extension(ext: impl Into<ProtocolId>) -> DhtOption {
    let ext = ext.into();

    Box::new(move |c: &mut Config| {
        c.protocol_prefix = c.protocol_prefix.clone() + &ext;
        Ok(())
    })
}

/// Sets the bucket size (k). Defaults to 20.
pub fn bucket_size(bucket_size: usize) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.bucket_size = bucket_size;
        Ok(())
    })
}

/// Sets the number of concurrent requests per query path (alpha). Defaults to 10.
pub fn concurrency(alpha: usize) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.concurrency = alpha;
        Ok(())
    })
}

/// Sets the number of peers closest to a target that must have responded for a query path to
/// complete (beta). Defaults to 3.
pub fn resiliency(beta: usize) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.resiliency = beta;
        Ok(())
    })
}

/// Sets how long a received value record is held, independently of any validity the record
/// itself carries.
pub fn max_record_age(max_age: Duration) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.max_record_age = max_age;
        Ok(())
    })
}

/// Disables both the periodic refresh and the refresh triggered by a sparse routing table.
pub fn disable_auto_refresh() -> DhtOption {
    Box::new(|c: &mut Config| {
        c.routing_table.auto_refresh = false;
        Ok(())
    })
}

/// Disables provider records. Only for forked networks with their own prefix.
pub fn disable_providers() -> DhtOption {
    Box::new(|c: &mut Config| {
        c.enable_providers = false;
        Ok(())
    })
}

/// Disables value records (including public keys). Only for forked networks with their own
/// prefix.
pub fn disable_values() -> DhtOption {
    Box::new(|c: &mut Config| {
        c.enable_values = false;
        Ok(())
    })
}

/// Sets the predicate approving which peers may be dialed during a query.
pub fn query_filter<F>(filter: F) -> DhtOption
where
    F: Fn(&PeerInfo) -> bool + Send + Sync + 'static,
{
    Box::new(move |c: &mut Config| {
        c.query_peer_filter = Arc::new(filter);
        Ok(())
    })
}

/// Sets the predicate approving which connected peers may be added to the routing table.
pub fn routing_table_filter<F>(filter: F) -> DhtOption
where
    F: Fn(&PeerId) -> bool + Send + Sync + 'static,
{
    Box::new(move |c: &mut Config| {
        c.routing_table.peer_filter = Arc::new(filter);
        Ok(())
    })
}

/// Protects the connections of the peers in every bucket, [`protected_buckets`] is then ignored.
pub fn enable_protect_all_buckets() -> DhtOption {
    Box::new(|c: &mut Config| {
        c.protect_all_buckets = true;
        Ok(())
    })
}

/// Sets the maximum common prefix length of the buckets whose peers are protected, `-1` disables
/// protection. Defaults to 1.
pub fn protected_buckets(max_cpl: i32) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.protected_buckets = max_cpl;
        Ok(())
    })
}

/// Ranks lookup candidates by both XOR distance and latency, tuned by
/// [`avg_bits_improved_per_step`] and [`avg_round_trip_per_step`].
pub fn enable_consider_latency() -> DhtOption {
    Box::new(|c: &mut Config| {
        c.routing_table.consider_latency = true;
        Ok(())
    })
}

/// Sets the estimated number of bits a lookup step improves on average.
pub fn avg_bits_improved_per_step(bits: f64) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.routing_table.avg_bits_improved_per_step = bits;
        Ok(())
    })
}

/// Sets the estimated number of round trips per lookup step, e.g. 4 for TCP + TLS 1.3 and 2 for
/// QUIC.
pub fn avg_round_trip_per_step(round_trips: f64) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.routing_table.avg_round_trip_per_step = round_trips;
        Ok(())
    })
}

/// Uses the v1 protocol names while keeping the current query and routing table logic.
pub fn v1_compatible_mode(enable: bool) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.v1_compatible_mode = enable;
        Ok(())
    })
}

/// Sets the peers used to seed the routing table when it is empty.
pub fn bootstrap_peers(bootstrappers: Vec<PeerInfo>) -> DhtOption {
    Box::new(move |c: &mut Config| {
        c.bootstrap_peers = bootstrappers;
        Ok(())
    })
}
