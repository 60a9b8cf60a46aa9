//! The 20-byte identifier of a Mainline DHT node.
//!
//! Two ids define a distance via bitwise XOR interpreted as a big-endian
//! 160-bit integer (see [BEP 5](https://www.bittorrent.org/beps/bep_0005.html)).
//! The crawler never keeps a stable id of its own: for every conversation it
//! forges an id adjacent to the remote node with [`NodeId::neighbour_of`], so
//! that remote nodes route their `get_peers` and `announce_peer` traffic to it.
use rand::Rng;

/// A DHT node identifier.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 20]);

pub const NODE_ID_BYTES_LEN: usize = 20;

/// How many leading bytes [`NodeId::neighbour_of`] copies from the target id.
pub const NEIGHBOUR_PREFIX_LEN: usize = 15;

impl NodeId {
    /// Returns the id internal byte array.
    #[must_use]
    pub fn bytes(&self) -> [u8; 20] {
        self.0
    }

    /// A uniformly random id.
    #[must_use]
    pub fn random() -> Self {
        let mut data = [0u8; NODE_ID_BYTES_LEN];
        rand::thread_rng().fill(&mut data);
        Self(data)
    }

    /// Forges an id that the rest of the DHT considers a close neighbour of
    /// `target`: the first 15 bytes are copied from `target`, the trailing 5
    /// are random.
    #[must_use]
    pub fn neighbour_of(target: &NodeId) -> Self {
        let mut data = target.0;
        rand::thread_rng().fill(&mut data[NEIGHBOUR_PREFIX_LEN..]);
        Self(data)
    }

    /// XOR distance to `other`, big-endian.
    #[must_use]
    pub fn distance(&self, other: &NodeId) -> [u8; 20] {
        let mut distance = [0u8; NODE_ID_BYTES_LEN];
        for (i, byte) in distance.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        distance
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chars = [0u8; 40];
        binascii::bin2hex(&self.0, &mut chars).expect("failed to hexlify");
        write!(f, "{}", std::str::from_utf8(&chars).unwrap())
    }
}

impl std::convert::From<[u8; 20]> for NodeId {
    fn from(bytes: [u8; 20]) -> Self {
        NodeId(bytes)
    }
}

impl TryFrom<&[u8]> for NodeId {
    type Error = crate::info_hash::ConversionError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let info_hash = crate::info_hash::InfoHash::try_from(bytes)?;
        Ok(Self(info_hash.0))
    }
}

#[cfg(test)]
mod tests {
    use crate::node_id::{NodeId, NEIGHBOUR_PREFIX_LEN};

    #[test]
    fn a_forged_neighbour_shares_the_first_fifteen_bytes_of_the_target() {
        let target = NodeId([
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13,
            0x14,
        ]);

        let forged = NodeId::neighbour_of(&target);

        assert_eq!(forged.0[..NEIGHBOUR_PREFIX_LEN], target.0[..NEIGHBOUR_PREFIX_LEN]);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let id = NodeId::random();

        assert_eq!(id.distance(&id), [0u8; 20]);
    }

    #[test]
    fn distance_is_bitwise_xor() {
        let a = NodeId([0xFF; 20]);
        let b = NodeId([0x0F; 20]);

        assert_eq!(a.distance(&b), [0xF0; 20]);
    }
}
