use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::core::traits::Peerstore;

/// The namespace holding public key records.
pub const PK_NAMESPACE: &str = "pk";

/// The namespace holding naming records.
pub const IPNS_NAMESPACE: &str = "ipns";

/// A user-supplied record validator.
///
/// Implemented by the embedding node and installed with
/// [`options::validator`](super::options::validator). This crate only stores it in the
/// configuration, the node's record store calls it when accepting a record.
pub trait RecordValidator: Send + Sync {
    /// Returns whether the record stored under `key` is acceptable.
    fn validate(&self, key: &str, value: &[u8]) -> bool;
}

/// Record validation policy.
///
/// Whether a validator can hold namespaces is part of its variant, the configuration logic
/// matches on it rather than inspecting what's behind a trait object.
#[derive(Clone)]
pub enum Validator {
    /// The built-in public key record validator.
    PublicKey,
    /// The built-in naming record validator, resolving keys through the peerstore.
    Ipns(Arc<dyn Peerstore>),
    Custom(Arc<dyn RecordValidator>),
    /// Dispatches `/<namespace>/...` keys to the validator registered for the namespace.
    Namespaced(BTreeMap<String, Validator>),
}

impl Validator {
    /// Creates an empty namespaced validator.
    pub fn namespaced() -> Self {
        Validator::Namespaced(BTreeMap::new())
    }

    pub fn custom(validator: impl RecordValidator + 'static) -> Self {
        Validator::Custom(Arc::new(validator))
    }

    pub fn is_namespaced(&self) -> bool {
        matches!(self, Validator::Namespaced(_))
    }

    /// Returns the namespace table if this is a namespaced validator.
    pub fn namespaces(&self) -> Option<&BTreeMap<String, Validator>> {
        match self {
            Validator::Namespaced(namespaces) => Some(namespaces),
            _ => None,
        }
    }

    /// Returns the validator responsible for `key`. A namespaced validator only answers for keys
    /// of the form `/<namespace>/<rest>` with a registered namespace, any other validator answers
    /// for every key.
    ///
    /// Meant for the embedding node's record store, which resolves incoming records against
    /// [`Config::validator`](super::Config::validator) with it.
    pub fn for_key(&self, key: &str) -> Option<&Validator> {
        let namespaces = match self {
            Validator::Namespaced(namespaces) => namespaces,
            other => return Some(other),
        };

        let (namespace, rest) = key.strip_prefix('/')?.split_once('/')?;
        if rest.is_empty() {
            return None;
        }

        namespaces.get(namespace)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::PublicKey => f.write_str("PublicKey"),
            Validator::Ipns(_) => f.write_str("Ipns"),
            Validator::Custom(_) => f.write_str("Custom"),
            Validator::Namespaced(namespaces) => {
                f.debug_tuple("Namespaced").field(namespaces).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;

    impl RecordValidator for AcceptAll {
        fn validate(&self, _key: &str, _value: &[u8]) -> bool {
            true
        }
    }

    fn pk_only() -> Validator {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(PK_NAMESPACE.to_owned(), Validator::PublicKey);
        Validator::Namespaced(namespaces)
    }

    #[test]
    fn for_key_dispatches_on_namespace() {
        let validator = pk_only();

        assert!(matches!(
            validator.for_key("/pk/QmPeer"),
            Some(Validator::PublicKey)
        ));
        assert!(validator.for_key("/ipns/QmPeer").is_none());
    }

    #[test]
    fn for_key_malformed() {
        let validator = pk_only();

        assert!(validator.for_key("pk/QmPeer").is_none());
        assert!(validator.for_key("/pk").is_none());
        assert!(validator.for_key("/pk/").is_none());
    }

    #[test]
    fn for_key_simple_answers_everything() {
        let validator = Validator::custom(AcceptAll);

        assert!(matches!(
            validator.for_key("anything"),
            Some(Validator::Custom(_))
        ));
        assert!(!validator.is_namespaced());
        assert!(validator.namespaces().is_none());
    }
}
