//! DHT construction parameters.
//!
//! A [`Config`] is built once from a list of [`DhtOption`]s and then shared read-only, behind an
//! [`Arc`], with everything that needs it: the membership controller, the connection protection
//! policy and the lookup executor.

use std::{fmt, sync::Arc, time::Duration};

use crate::core::{
    datastore::{Datastore, MemoryDatastore},
    id::{PeerId, PeerInfo},
    protocol::ProtocolId,
    traits::Peerstore,
};

mod error;
pub mod options;
mod validator;

pub use error::ConfigError;
pub use validator::{RecordValidator, Validator, IPNS_NAMESPACE, PK_NAMESPACE};

/// The application specific prefix attached to all DHT protocols by default. Networks using it
/// must stick to the default parameters, [`Config::build`] rejects any other.
pub const DEFAULT_PREFIX: &str = "/ipfs";

/// The bucket size (k) networks using [`DEFAULT_PREFIX`] must use.
pub const DEFAULT_BUCKET_SIZE: usize = 20;

/// By default, peers in buckets with a common prefix length of up to 1 are protected.
pub const DEFAULT_PROTECTED_BUCKETS: i32 = 1;

/// A construction-time option, applied to the configuration in the order given.
pub type DhtOption = Box<dyn FnOnce(&mut Config) -> Result<(), ConfigError> + Send>;

/// Approves which peers may be dialed during a query.
pub type QueryFilter = Arc<dyn Fn(&PeerInfo) -> bool + Send + Sync>;

/// Approves which peers may be added to the routing table. The host already holds a connection
/// to the peer under consideration.
pub type RoutingTableFilter = Arc<dyn Fn(&PeerId) -> bool + Send + Sync>;

/// The mode the DHT operates in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeOpt {
    /// Switches between client and server depending on the node's reachability.
    #[default]
    Auto,
    /// Sends queries but doesn't answer them.
    Client,
    /// Sends and answers queries.
    Server,
    /// Same as [`ModeOpt::Auto`], but acts as a server while reachability is unknown.
    AutoServer,
}

/// Routing table maintenance and lookup tuning.
#[derive(Clone)]
pub struct RoutingTableConfig {
    pub(crate) refresh_query_timeout: Duration,
    pub(crate) refresh_interval: Duration,
    pub(crate) auto_refresh: bool,
    pub(crate) latency_tolerance: Duration,
    pub(crate) peer_filter: RoutingTableFilter,
    pub(crate) consider_latency: bool,
    pub(crate) avg_bits_improved_per_step: f64,
    pub(crate) avg_round_trip_per_step: f64,
}

impl RoutingTableConfig {
    pub fn refresh_query_timeout(&self) -> Duration {
        self.refresh_query_timeout
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Whether the table is refreshed periodically and when it runs low on peers.
    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    /// The maximum acceptable latency for peers in the table.
    pub fn latency_tolerance(&self) -> Duration {
        self.latency_tolerance
    }

    pub fn peer_filter(&self) -> &RoutingTableFilter {
        &self.peer_filter
    }

    /// Whether lookups rank candidates by estimated cost rather than by XOR distance alone.
    pub fn consider_latency(&self) -> bool {
        self.consider_latency
    }

    pub fn avg_bits_improved_per_step(&self) -> f64 {
        self.avg_bits_improved_per_step
    }

    pub fn avg_round_trip_per_step(&self) -> f64 {
        self.avg_round_trip_per_step
    }
}

/// The validated DHT configuration.
///
/// [`Config::build`] is the only way to obtain one, there are no defaults or setters to bypass the
/// validation with:
///
/// ```compile_fail
/// let config = kadwatch::Config::default();
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) datastore: Arc<dyn Datastore>,
    pub(crate) validator: Validator,
    // Set once the validator is replaced, the pk/ipns defaults are then left out.
    pub(crate) validator_changed: bool,
    pub(crate) mode: ModeOpt,
    pub(crate) protocol_prefix: ProtocolId,
    pub(crate) bucket_size: usize,
    pub(crate) concurrency: usize,
    pub(crate) resiliency: usize,
    pub(crate) max_record_age: Duration,
    pub(crate) enable_providers: bool,
    pub(crate) enable_values: bool,
    pub(crate) query_peer_filter: QueryFilter,
    pub(crate) protect_all_buckets: bool,
    pub(crate) protected_buckets: i32,
    pub(crate) routing_table: RoutingTableConfig,
    pub(crate) v1_compatible_mode: bool,
    pub(crate) bootstrap_peers: Vec<PeerInfo>,
}

impl Config {
    // The starting point of `build`, a `Config` only leaves the crate validated.
    pub(crate) fn defaults() -> Self {
        Self {
            validator: Validator::namespaced(),
            validator_changed: false,
            datastore: Arc::new(MemoryDatastore::new()),
            mode: ModeOpt::Auto,
            protocol_prefix: ProtocolId::from(DEFAULT_PREFIX),
            bucket_size: DEFAULT_BUCKET_SIZE,
            concurrency: 10,
            resiliency: 3,
            max_record_age: Duration::from_secs(36 * 60 * 60),
            enable_providers: true,
            enable_values: true,
            query_peer_filter: Arc::new(|_| true),
            protect_all_buckets: false,
            protected_buckets: DEFAULT_PROTECTED_BUCKETS,
            routing_table: RoutingTableConfig {
                refresh_query_timeout: Duration::from_secs(60),
                refresh_interval: Duration::from_secs(10 * 60),
                auto_refresh: true,
                latency_tolerance: Duration::from_secs(60),
                peer_filter: Arc::new(|_| true),
                consider_latency: false,
                // For the basic Kademlia lookup, the bits improved per step approach
                // 1 + log2(k) + 0.3327 (Stutzbach & Rejaie, INFOCOM 2006).
                avg_bits_improved_per_step: 1.3327 + (DEFAULT_BUCKET_SIZE as f64).log2(),
                // Worst case, TCP + TLS 1.3 needs 4 round trips to a fresh peer. This makes the
                // common prefix length dominate the cost.
                avg_round_trip_per_step: 4.0,
            },
            v1_compatible_mode: true,
            bootstrap_peers: Vec::new(),
        }
    }
}

impl Config {
    /// Builds the configuration: defaults, then `options` in order, then the fallbacks that depend
    /// on the host's peerstore, then validation.
    pub fn build(
        options: impl IntoIterator<Item = DhtOption>,
        peerstore: &Arc<dyn Peerstore>,
    ) -> Result<Arc<Self>, ConfigError> {
        let mut config = Self::defaults();
        config.apply(options)?;
        config.apply_fallbacks(peerstore)?;
        config.validate()?;

        Ok(Arc::new(config))
    }

    /// Applies the options in order, stopping at the first one to fail.
    pub(crate) fn apply(
        &mut self,
        options: impl IntoIterator<Item = DhtOption>,
    ) -> Result<(), ConfigError> {
        for (index, option) in options.into_iter().enumerate() {
            option(self).map_err(|e| ConfigError::Option {
                index,
                source: Box::new(e),
            })?;
        }

        Ok(())
    }

    /// Completes the default namespaced validator with the public key and naming record
    /// validators, unless the user supplied their own validator.
    pub(crate) fn apply_fallbacks(
        &mut self,
        peerstore: &Arc<dyn Peerstore>,
    ) -> Result<(), ConfigError> {
        if self.validator_changed {
            return Ok(());
        }

        match &mut self.validator {
            Validator::Namespaced(namespaces) => {
                namespaces
                    .entry(PK_NAMESPACE.to_owned())
                    .or_insert(Validator::PublicKey);
                namespaces
                    .entry(IPNS_NAMESPACE.to_owned())
                    .or_insert_with(|| Validator::Ipns(Arc::clone(peerstore)));

                Ok(())
            }
            _ => Err(ConfigError::UnmarkedValidatorChange),
        }
    }

    /// Checks the invariants of the reserved [`DEFAULT_PREFIX`] namespace: the default bucket
    /// size, providers and values enabled, and a namespaced validator holding exactly the default
    /// `pk` and `ipns` validators. Other prefixes are unconstrained.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_prefix.as_str() != DEFAULT_PREFIX {
            return Ok(());
        }

        let prefix = || self.protocol_prefix.clone();

        if self.bucket_size != DEFAULT_BUCKET_SIZE {
            return Err(ConfigError::ReservedBucketSize {
                prefix: prefix(),
                expected: DEFAULT_BUCKET_SIZE,
            });
        }

        if !self.enable_providers {
            return Err(ConfigError::ReservedProviders(prefix()));
        }

        if !self.enable_values {
            return Err(ConfigError::ReservedValues(prefix()));
        }

        let namespaces = self
            .validator
            .namespaces()
            .ok_or_else(|| ConfigError::ReservedValidator(prefix()))?;

        if namespaces.len() != 2 {
            return Err(ConfigError::ReservedNamespaceCount(prefix()));
        }

        match namespaces.get(PK_NAMESPACE) {
            None => {
                return Err(ConfigError::ReservedNamespaceMissing {
                    prefix: prefix(),
                    namespace: PK_NAMESPACE,
                })
            }
            Some(Validator::PublicKey) => {}
            Some(_) => {
                return Err(ConfigError::ReservedNamespaceValidator {
                    prefix: prefix(),
                    namespace: PK_NAMESPACE,
                })
            }
        }

        match namespaces.get(IPNS_NAMESPACE) {
            None => Err(ConfigError::ReservedNamespaceMissing {
                prefix: prefix(),
                namespace: IPNS_NAMESPACE,
            }),
            Some(Validator::Ipns(_)) => Ok(()),
            Some(_) => Err(ConfigError::ReservedNamespaceValidator {
                prefix: prefix(),
                namespace: IPNS_NAMESPACE,
            }),
        }
    }

    /// The DHT protocols this node speaks, in order of preference.
    pub fn protocols(&self) -> Vec<ProtocolId> {
        let version = if self.v1_compatible_mode {
            "/kad/1.0.0"
        } else {
            "/kad/2.0.0"
        };

        vec![self.protocol_prefix.clone() + version]
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn mode(&self) -> ModeOpt {
        self.mode
    }

    pub fn protocol_prefix(&self) -> &ProtocolId {
        &self.protocol_prefix
    }

    /// The number of peers per bucket (k).
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// The number of peers queried in parallel per lookup round (alpha).
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// The number of closest peers that must respond for a lookup to terminate (beta).
    pub fn resiliency(&self) -> usize {
        self.resiliency
    }

    pub fn max_record_age(&self) -> Duration {
        self.max_record_age
    }

    pub fn enable_providers(&self) -> bool {
        self.enable_providers
    }

    pub fn enable_values(&self) -> bool {
        self.enable_values
    }

    pub fn query_peer_filter(&self) -> &QueryFilter {
        &self.query_peer_filter
    }

    pub fn protect_all_buckets(&self) -> bool {
        self.protect_all_buckets
    }

    /// The maximum common prefix length of the buckets whose peers are protected, `-1` disables
    /// protection.
    pub fn protected_buckets(&self) -> i32 {
        self.protected_buckets
    }

    pub fn routing_table(&self) -> &RoutingTableConfig {
        &self.routing_table
    }

    pub fn v1_compatible_mode(&self) -> bool {
        self.v1_compatible_mode
    }

    pub fn bootstrap_peers(&self) -> &[PeerInfo] {
        &self.bootstrap_peers
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("validator", &self.validator)
            .field("validator_changed", &self.validator_changed)
            .field("mode", &self.mode)
            .field("protocol_prefix", &self.protocol_prefix)
            .field("bucket_size", &self.bucket_size)
            .field("concurrency", &self.concurrency)
            .field("resiliency", &self.resiliency)
            .field("max_record_age", &self.max_record_age)
            .field("enable_providers", &self.enable_providers)
            .field("enable_values", &self.enable_values)
            .field("protect_all_buckets", &self.protect_all_buckets)
            .field("protected_buckets", &self.protected_buckets)
            .field("auto_refresh", &self.routing_table.auto_refresh)
            .field("consider_latency", &self.routing_table.consider_latency)
            .field("v1_compatible_mode", &self.v1_compatible_mode)
            .field("bootstrap_peers", &self.bootstrap_peers)
            .finish_non_exhaustive()
    }
}
