use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;
use std::hash::Hash;
use std::hash::Hasher;

/// Length (in bytes) of a node's random bit string `rs`. Must stay a
/// multiple of 8 per the wire format (`rs` is serialized as the raw bytes of
/// `RS_BIT_LENGTH / 8`).
pub const RS_BYTE_LENGTH: usize = 2;
pub const RS_BIT_LENGTH: usize = RS_BYTE_LENGTH * 8;

/// A fixed-length, uniformly-random bit string. Equality and prefix
/// comparisons are bitwise; the underlying bytes are exactly what travels on
/// the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BitString {
    bytes: Vec<u8>,
}

impl BitString {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn random(byte_len: usize) -> Self {
        use rand::RngCore;
        let mut bytes = vec![0u8; byte_len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Returns the bit at index `i` (0 = most significant bit of byte 0).
    pub fn bit(&self, i: usize) -> bool {
        let byte = self.bytes[i / 8];
        (byte >> (7 - (i % 8))) & 1 == 1
    }

    /// Returns the first `i` bits, as an owned, independently comparable
    /// value. `prefix(0, _)` is the empty prefix and compares equal for any
    /// two bit strings.
    pub fn prefix(&self, i: usize) -> Vec<bool> {
        (0..i).map(|bit| self.bit(bit)).collect()
    }
}

/// A copyable value handle identifying a peer: host, port, random bit
/// string, and the 64-bit id derived from `host:port`. Equality and the
/// total order are defined strictly by `id`, per spec — two different
/// (host, port) pairs are never expected to collide, but if they ever did,
/// id equality alone is still what the algorithm and the wire format key
/// off of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    pub host: String,
    pub port: u16,
    pub rs: BitString,
    pub id: u64,
}

impl NodeRef {
    pub fn new(host: impl Into<String>, port: u16, rs: BitString) -> Self {
        let host = host.into();
        let id = node_id(&host, port);
        Self {
            host,
            port,
            rs,
            id,
        }
    }

    pub fn peer_key(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Projection of `id` onto the unit interval `[0, 1)`, used by the DHT
    /// layer for key ownership.
    pub fn unit_id(&self) -> f64 {
        (self.id as f64) / (u64::MAX as f64 + 1.0)
    }
}

/// Hashes `"{host}:{port}"` with blake3 and takes the first 8 bytes as a
/// big-endian `u64`. Non-cryptographic use: a fast, stable identifier, not a
/// security boundary.
pub fn node_id(host: &str, port: u16) -> u64 {
    let digest = blake3::hash(format!("{host}:{port}").as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_be_bytes(buf)
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for NodeRef {}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

/// A `NodeRef` extended with the two order sentinels `LOWEST` and
/// `HIGHEST`. For every real `NodeRef` v: `Lowest < Node(v) < Highest`.
/// Represented as a sum type (per the design notes) rather than a subclass,
/// so dereferencing a sentinel as a remote target is a compile error
/// everywhere except the one place (`client`) that pattern-matches on it and
/// turns a sentinel dereference attempt into an `InvariantViolation`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeerRef {
    Lowest,
    Node(NodeRef),
    Highest,
}

impl PeerRef {
    pub fn is_real(&self) -> bool {
        matches!(self, PeerRef::Node(_))
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            PeerRef::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<NodeRef> {
        match self {
            PeerRef::Node(n) => Some(n),
            _ => None,
        }
    }
}

impl From<NodeRef> for PeerRef {
    fn from(n: NodeRef) -> Self {
        PeerRef::Node(n)
    }
}

impl PartialEq<NodeRef> for PeerRef {
    fn eq(&self, other: &NodeRef) -> bool {
        matches!(self, PeerRef::Node(n) if n == other)
    }
}
impl PartialEq<PeerRef> for NodeRef {
    fn eq(&self, other: &PeerRef) -> bool {
        other == self
    }
}
impl PartialOrd<NodeRef> for PeerRef {
    fn partial_cmp(&self, other: &NodeRef) -> Option<Ordering> {
        self.partial_cmp(&PeerRef::Node(other.clone()))
    }
}
impl PartialOrd<PeerRef> for NodeRef {
    fn partial_cmp(&self, other: &PeerRef) -> Option<Ordering> {
        PeerRef::Node(self.clone()).partial_cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_places_sentinels_outside_any_real_node() {
        let a = NodeRef::new("127.0.0.1", 1, BitString::from_bytes(vec![0, 0]));
        assert!(PeerRef::Lowest < PeerRef::Node(a.clone()));
        assert!(PeerRef::Node(a) < PeerRef::Highest);
    }

    #[test]
    fn node_ref_equality_and_order_is_by_id_only() {
        let rs_a = BitString::from_bytes(vec![0xff, 0x00]);
        let rs_b = BitString::from_bytes(vec![0x00, 0xff]);
        let a = NodeRef::new("host-a", 1000, rs_a);
        let b = NodeRef::new("host-b", 2000, rs_b);
        assert_ne!(a, b);
        assert_eq!(a.cmp(&b), a.id.cmp(&b.id));
    }

    #[test]
    fn prefix_of_zero_is_always_empty() {
        let rs = BitString::from_bytes(vec![0xab, 0xcd]);
        assert_eq!(rs.prefix(0), Vec::<bool>::new());
        assert_eq!(rs.prefix(4), vec![true, false, true, false]);
    }
}
