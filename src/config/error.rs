use thiserror::Error;

use crate::core::protocol::ProtocolId;

/// Errors raised while constructing a [`Config`](crate::config::Config). A node whose
/// configuration fails to build never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("dht option {index} failed: {source}")]
    Option {
        index: usize,
        source: Box<ConfigError>,
    },

    #[error("can only add namespaced validators to a namespaced validator")]
    NotNamespaced,

    #[error("the default validator was changed without being marked as changed")]
    UnmarkedValidatorChange,

    #[error("protocol prefix {prefix} must use bucket size {expected}")]
    ReservedBucketSize {
        prefix: ProtocolId,
        expected: usize,
    },

    #[error("protocol prefix {0} must have providers enabled")]
    ReservedProviders(ProtocolId),

    #[error("protocol prefix {0} must have values enabled")]
    ReservedValues(ProtocolId),

    #[error("protocol prefix {0} must use a namespaced validator")]
    ReservedValidator(ProtocolId),

    #[error("protocol prefix {0} must have exactly two namespaced validators - /pk and /ipns")]
    ReservedNamespaceCount(ProtocolId),

    #[error("protocol prefix {prefix} must support the /{namespace} namespaced validator")]
    ReservedNamespaceMissing {
        prefix: ProtocolId,
        namespace: &'static str,
    },

    #[error("protocol prefix {prefix} requires the default /{namespace} validator")]
    ReservedNamespaceValidator {
        prefix: ProtocolId,
        namespace: &'static str,
    },
}
