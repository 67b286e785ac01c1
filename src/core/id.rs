use std::{fmt, net::SocketAddr};

#[cfg(feature = "codec")]
use bincode::{Decode, Encode};

/// A peer's identifier in the DHT keyspace.
///
/// The bytes are stored most-significant first, so the lexicographic order of two XOR distances
/// is also their numeric order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct PeerId {
    bytes: [u8; Self::BYTES],
}

impl PeerId {
    /// The size of the id in bytes.
    pub const BYTES: usize = 32;

    /// The size of the id in bits.
    pub const BITS: u32 = 32 * 8;

    pub fn new(bytes: [u8; Self::BYTES]) -> Self {
        PeerId { bytes }
    }

    pub fn bytes(&self) -> [u8; Self::BYTES] {
        self.bytes
    }

    /// Convenience function for working with small ids, the value is placed in the
    /// least-significant bytes.
    #[doc(hidden)]
    pub fn from_u16(raw: u16) -> Self {
        let mut bytes = [0u8; Self::BYTES];
        bytes[Self::BYTES - 2..].copy_from_slice(&raw.to_be_bytes());

        Self { bytes }
    }

    /// Convenience function for generating random ids during testing.
    #[doc(hidden)]
    pub fn rand() -> Self {
        use rand::{thread_rng, Fill};

        let mut rng = thread_rng();
        let mut bytes = [0u8; Self::BYTES];
        let _res = bytes.try_fill(&mut rng);
        debug_assert!(_res.is_ok());

        Self { bytes }
    }

    /// Returns the XOR distance between two ids.
    pub fn distance(&self, other: &PeerId) -> [u8; Self::BYTES] {
        let mut distance = [0u8; Self::BYTES];
        for (d, (a, b)) in distance
            .iter_mut()
            .zip(self.bytes.iter().zip(other.bytes.iter()))
        {
            *d = a ^ b;
        }

        distance
    }

    /// Returns the number of leading bits the two ids have in common. This is the index of the
    /// bucket the other id falls into relative to this one; identical ids share all
    /// [`PeerId::BITS`].
    pub fn common_prefix_len(&self, other: &PeerId) -> u32 {
        // Search process:
        //
        // [0, 0, 5, 9] <- XOR of the two ids, most-significant byte first
        //  0  1  2  3  <- i
        //
        // The first non-zero byte sits at index 2, so 16 bits are shared, plus the leading zeros
        // of that byte (5 = 0b00000101 -> 5 leading zeros).
        self.distance(other)
            .iter()
            .enumerate()
            .find(|(_, byte)| **byte != 0b0)
            // The left shift multiplies the index by 8 to get its value in bits.
            .map(|(i, byte)| ((i as u32) << 3) + byte.leading_zeros())
            .unwrap_or(Self::BITS)
    }
}

/// A peer's identifier along with the addresses it can be reached at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerId,
    pub addrs: Vec<SocketAddr>,
}

impl PeerInfo {
    pub fn new(id: PeerId, addrs: Vec<SocketAddr>) -> Self {
        Self { id, addrs }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

impl fmt::Display for PeerId {
    // Abbreviated hex, enough to tell peers apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes[..6] {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng};

    use super::*;

    #[test]
    fn common_prefix_len() {
        const N: usize = 1000;

        let mut rng = thread_rng();

        for _ in 0..N {
            let a: u16 = rng.gen();
            let b: u16 = rng.gen();

            let id_a = PeerId::from_u16(a);
            let id_b = PeerId::from_u16(b);

            // All but the last 16 bits are zero for both ids.
            let std = PeerId::BITS - 16 + (a ^ b).leading_zeros();

            assert_eq!(id_a.common_prefix_len(&id_b), std)
        }
    }

    #[test]
    fn common_prefix_len_self() {
        let id = PeerId::rand();
        assert_eq!(id.common_prefix_len(&id), PeerId::BITS);
    }

    #[test]
    fn common_prefix_len_first_bit() {
        let a = PeerId::new([0u8; PeerId::BYTES]);
        let mut bytes = [0u8; PeerId::BYTES];
        bytes[0] = 0b1000_0000;
        let b = PeerId::new(bytes);

        assert_eq!(a.common_prefix_len(&b), 0);
    }

    #[test]
    fn distance_orders_numerically() {
        let local = PeerId::from_u16(0);

        assert!(local.distance(&PeerId::from_u16(1)) < local.distance(&PeerId::from_u16(2)));
        assert!(local.distance(&PeerId::from_u16(255)) < local.distance(&PeerId::from_u16(256)));
    }

    #[test]
    fn display_is_abbreviated() {
        let mut bytes = [0u8; PeerId::BYTES];
        bytes[0] = 0xab;
        assert_eq!(PeerId::new(bytes).to_string(), "ab0000000000");
    }
}
