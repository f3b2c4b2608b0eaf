//! Wire format for native-zone deliveries.
//!
//! When a registrant moves a native name straight to the wrapper through the
//! registrar, the transfer carries a CBOR (RFC 8949) [`TransferData`] that
//! says how the name should be wrapped.
//!
//! ## Security Limits
//!
//! - **Payload size**: Limited to [`MAX_TRANSFER_DATA_SIZE`] before any
//!   decoding happens.

use crate::error::{Error, Result};
use crate::fuses::Fuses;
use crate::name::Address;
use serde::{Deserialize, Serialize};

/// Maximum accepted size of an encoded [`TransferData`] (4 KB).
///
/// A label is at most 255 bytes and the rest is fixed-size.
pub const MAX_TRANSFER_DATA_SIZE: usize = 4 * 1024;

/// Wrap instructions carried by a registrar transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    pub label: String,
    pub owner: Address,
    pub owner_controlled_fuses: u16,
    pub resolver: Address,
}

impl TransferData {
    pub fn new(label: impl Into<String>, owner: Address) -> Self {
        Self {
            label: label.into(),
            owner,
            owner_controlled_fuses: 0,
            resolver: Address::ZERO,
        }
    }

    pub fn with_fuses(mut self, fuses: u16) -> Self {
        self.owner_controlled_fuses = fuses;
        self
    }

    pub fn with_resolver(mut self, resolver: Address) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn fuses(&self) -> Fuses {
        Fuses::from_owner_bits(self.owner_controlled_fuses)
    }
}

/// Encode transfer data to CBOR.
pub fn encode(data: &TransferData) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(data, &mut buf)?;
    Ok(buf)
}

/// Decode transfer data.
///
/// Returns `PayloadTooLarge` if the input exceeds [`MAX_TRANSFER_DATA_SIZE`].
pub fn decode(bytes: &[u8]) -> Result<TransferData> {
    if bytes.len() > MAX_TRANSFER_DATA_SIZE {
        return Err(Error::PayloadTooLarge {
            size: bytes.len(),
            max: MAX_TRANSFER_DATA_SIZE,
        });
    }
    if bytes.is_empty() {
        return Err(Error::DeserializationError(
            "transfer carries no wrap instructions".into(),
        ));
    }
    Ok(ciborium::de::from_reader(bytes)?)
}

/// Hex form for command-line use.
pub fn encode_hex(data: &TransferData) -> Result<String> {
    Ok(hex::encode(encode(data)?))
}

pub fn decode_hex(s: &str) -> Result<TransferData> {
    let trimmed = s.trim().strip_prefix("0x").unwrap_or(s.trim());
    if trimmed.len() / 2 > MAX_TRANSFER_DATA_SIZE {
        return Err(Error::PayloadTooLarge {
            size: trimmed.len() / 2,
            max: MAX_TRANSFER_DATA_SIZE,
        });
    }
    let bytes = hex::decode(trimmed).map_err(|e| Error::DeserializationError(e.to_string()))?;
    decode(&bytes)
}
