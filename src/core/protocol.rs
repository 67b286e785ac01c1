//! Protocol identifiers.

use std::{fmt, ops::Add};

#[cfg(feature = "codec")]
use bincode::{Decode, Encode};

/// An application protocol identifier, e.g. `/ipfs/kad/1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct ProtocolId(String);

impl ProtocolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProtocolId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProtocolId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Concatenation, used to build ids from a prefix and extensions.
impl Add<&ProtocolId> for ProtocolId {
    type Output = ProtocolId;

    fn add(mut self, rhs: &ProtocolId) -> Self::Output {
        self.0.push_str(&rhs.0);
        self
    }
}

impl Add<&str> for ProtocolId {
    type Output = ProtocolId;

    fn add(mut self, rhs: &str) -> Self::Output {
        self.0.push_str(rhs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat() {
        let prefix = ProtocolId::from("/ipfs");
        let ext = ProtocolId::from("/lan");

        assert_eq!((prefix + &ext + "/kad/1.0.0").as_str(), "/ipfs/lan/kad/1.0.0");
    }
}
