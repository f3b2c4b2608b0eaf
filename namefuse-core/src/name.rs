//! Name primitives: addresses, nodes, label hashes and DNS wire names.
//!
//! A node is the hierarchical hash of a dotted name:
//!
//! ```text
//! namehash("")          = 0x00..00
//! namehash(label.rest)  = H(namehash(rest) || H(label))
//! ```
//!
//! `H` is SHA-256. Names are stored in DNS wire format (length-prefixed
//! labels terminated by a zero byte), so a node can always be mapped back to
//! the human-readable name it was created from.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Longest label the DNS wire format can carry.
pub const MAX_WIRE_LABEL_LENGTH: usize = 255;

// ============================================================================
// Address
// ============================================================================

/// A 20-byte account identifier.
///
/// The zero address is never a valid owner: it is the "no owner" sentinel
/// throughout the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Deterministic address with every byte set to `n`. Handy for tests
    /// and simulations.
    pub const fn repeat_byte(n: u8) -> Self {
        Self([n; 20])
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Short form for logs: first four bytes in hex.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 20] = decode_fixed_hex(s)
            .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = serde_bytes_vec(deserializer)?;
            let arr: [u8; 20] = bytes
                .try_into()
                .map_err(|_| serde::de::Error::custom("address must be 20 bytes"))?;
            Ok(Self(arr))
        }
    }
}

// ============================================================================
// Node / LabelHash
// ============================================================================

/// Hierarchical hash identifying a name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Node([u8; 32]);

/// Hash of a single label.
///
/// For names directly under the native zone this doubles as the registrar
/// token identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LabelHash([u8; 32]);

impl Node {
    /// The root node, `namehash("")`.
    pub const ROOT: Node = Node([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Derive the node of `label` under `self`.
    pub fn child(&self, label: &LabelHash) -> Node {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(label.0);
        Node(hasher.finalize().into())
    }
}

impl LabelHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

macro_rules! hash_display {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({}..)"), hex::encode(&self.0[..6]))
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                decode_fixed_hex(s)
                    .map(Self)
                    .ok_or_else(|| Error::InvalidName(format!("not a 32-byte hex hash: {}", s)))
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    let bytes = serde_bytes_vec(deserializer)?;
                    let arr: [u8; 32] = bytes
                        .try_into()
                        .map_err(|_| serde::de::Error::custom("hash must be 32 bytes"))?;
                    Ok(Self(arr))
                }
            }
        }
    };
}

hash_display!(Node);
hash_display!(LabelHash);

/// Hash a single label.
pub fn labelhash(label: &str) -> LabelHash {
    LabelHash(Sha256::digest(label.as_bytes()).into())
}

/// Hash a dotted name. The empty string is the root.
pub fn namehash(name: &str) -> Node {
    if name.is_empty() {
        return Node::ROOT;
    }
    name.rsplit('.')
        .fold(Node::ROOT, |node, label| node.child(&labelhash(label)))
}

// ============================================================================
// DNS wire format
// ============================================================================

/// Check a label against the configured maximum length.
pub fn check_label(label: &str, max_len: usize) -> Result<()> {
    if label.is_empty() {
        return Err(Error::LabelTooShort);
    }
    if label.len() > max_len.min(MAX_WIRE_LABEL_LENGTH) {
        return Err(Error::LabelTooLong {
            label: label.to_string(),
        });
    }
    Ok(())
}

/// Encode a dotted name into DNS wire format.
pub fn encode_dns(name: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(name.len() + 2);
    if !name.is_empty() {
        for label in name.split('.') {
            check_label(label, MAX_WIRE_LABEL_LENGTH)?;
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    Ok(out)
}

/// Prepend `label` to an already-encoded parent name.
pub fn add_label(label: &str, parent: &[u8]) -> Result<Vec<u8>> {
    check_label(label, MAX_WIRE_LABEL_LENGTH)?;
    let mut out = Vec::with_capacity(label.len() + 1 + parent.len());
    out.push(label.len() as u8);
    out.extend_from_slice(label.as_bytes());
    out.extend_from_slice(parent);
    Ok(out)
}

/// Decode DNS wire format back into a dotted name.
pub fn decode_dns(wire: &[u8]) -> Result<String> {
    let labels = read_labels(wire)?;
    Ok(labels.join("."))
}

/// Split a wire name into its labels, validating framing.
pub fn read_labels(wire: &[u8]) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    let mut offset = 0usize;
    loop {
        let len = *wire
            .get(offset)
            .ok_or_else(|| Error::InvalidName("truncated wire name".into()))?
            as usize;
        offset += 1;
        if len == 0 {
            break;
        }
        let end = offset + len;
        let bytes = wire
            .get(offset..end)
            .ok_or_else(|| Error::InvalidName("label runs past end of wire name".into()))?;
        let label = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidName(format!("label is not utf-8: {}", e)))?;
        labels.push(label.to_string());
        offset = end;
    }
    if offset != wire.len() {
        return Err(Error::InvalidName("trailing bytes after wire name".into()));
    }
    Ok(labels)
}

/// A dotted name split into its first label and its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub label: String,
    pub labelhash: LabelHash,
    pub parent: Node,
    pub node: Node,
    pub wire: Vec<u8>,
}

impl ParsedName {
    /// Parse a dotted, non-root name.
    pub fn parse(name: &str) -> Result<Self> {
        let (label, rest) = match name.split_once('.') {
            Some((label, rest)) => (label, rest),
            None => (name, ""),
        };
        let wire = encode_dns(name)?;
        if label.is_empty() {
            return Err(Error::LabelTooShort);
        }
        let labelhash = labelhash(label);
        let parent = namehash(rest);
        Ok(Self {
            label: label.to_string(),
            labelhash,
            parent,
            node: parent.child(&labelhash),
            wire,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn decode_fixed_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).ok()?;
    bytes.try_into().ok()
}

fn serde_bytes_vec<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    struct BytesVisitor;

    impl<'de> serde::de::Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a byte string")
        }

        fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<Vec<u8>, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> std::result::Result<Vec<u8>, E> {
            Ok(v)
        }

        fn visit_seq<A: serde::de::SeqAccess<'de>>(
            self,
            mut seq: A,
        ) -> std::result::Result<Vec<u8>, A::Error> {
            let mut out = Vec::new();
            while let Some(b) = seq.next_element::<u8>()? {
                out.push(b);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_bytes(BytesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namehash_root_and_nesting() {
        assert_eq!(namehash(""), Node::ROOT);
        let eth = namehash("eth");
        assert_eq!(eth, Node::ROOT.child(&labelhash("eth")));
        assert_eq!(namehash("alice.eth"), eth.child(&labelhash("alice")));
        assert_ne!(namehash("alice.eth"), namehash("eth.alice"));
    }

    #[test]
    fn test_dns_wire_encoding() {
        let wire = encode_dns("sub.alice.eth").unwrap();
        assert_eq!(wire[0], 3);
        assert_eq!(&wire[1..4], b"sub");
        assert_eq!(*wire.last().unwrap(), 0);
        assert_eq!(decode_dns(&wire).unwrap(), "sub.alice.eth");
        assert_eq!(encode_dns("").unwrap(), vec![0]);
    }

    #[test]
    fn test_add_label_extends_parent() {
        let parent = encode_dns("eth").unwrap();
        let wire = add_label("alice", &parent).unwrap();
        assert_eq!(decode_dns(&wire).unwrap(), "alice.eth");
    }

    #[test]
    fn test_label_length_limits() {
        assert!(matches!(check_label("", 255), Err(Error::LabelTooShort)));
        let long = "a".repeat(256);
        assert!(matches!(check_label(&long, 255), Err(Error::LabelTooLong { .. })));
        assert!(matches!(check_label("abcdef", 4), Err(Error::LabelTooLong { .. })));
        assert!(check_label(&"a".repeat(255), 255).is_ok());
    }

    #[test]
    fn test_malformed_wire_rejected() {
        assert!(decode_dns(&[5, b'a', b'b']).is_err());
        assert!(decode_dns(&[1, b'a', 0, 9]).is_err());
        assert!(decode_dns(&[]).is_err());
    }

    #[test]
    fn test_parsed_name() {
        let parsed = ParsedName::parse("alice.eth").unwrap();
        assert_eq!(parsed.label, "alice");
        assert_eq!(parsed.parent, namehash("eth"));
        assert_eq!(parsed.node, namehash("alice.eth"));
        assert!(matches!(ParsedName::parse(".eth"), Err(Error::LabelTooShort)));
    }

    #[test]
    fn test_address_parse_and_display() {
        let addr = Address::repeat_byte(0xab);
        let shown = addr.to_string();
        assert!(shown.starts_with("0xabab"));
        assert_eq!(shown.parse::<Address>().unwrap(), addr);
        assert!("0x1234".parse::<Address>().is_err());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_address_json_is_hex_string() {
        let addr = Address::repeat_byte(1);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
