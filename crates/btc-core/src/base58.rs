//! Base58 and Base58Check codecs.
//!
//! The raw base conversion uses the Bitcoin alphabet via `bs58`; the
//! checksum framing (4-byte double SHA-256 suffix) is applied here so that
//! a corrupted string surfaces as [`BtcError::Checksum`] rather than a
//! generic decode failure.

use crypto_utils::hash::checksum;

use crate::error::BtcError;

/// Length of the Base58Check checksum suffix.
pub const CHECKSUM_LEN: usize = 4;

/// Encode `payload` as a big-endian base-58 number. Each leading zero byte
/// becomes a leading `'1'`.
pub fn encode(payload: &[u8]) -> String {
    bs58::encode(payload).into_string()
}

/// Inverse of [`encode`]. Fails with `Format` on characters outside the alphabet.
pub fn decode(encoded: &str) -> Result<Vec<u8>, BtcError> {
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| BtcError::Format(format!("invalid base58: {e}")))
}

/// `encode(payload ++ checksum(payload))`.
pub fn encode_checked(payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&checksum(payload));
    encode(&bytes)
}

/// Decode a Base58Check string and return the payload without its checksum.
pub fn decode_checked(encoded: &str) -> Result<Vec<u8>, BtcError> {
    let mut bytes = decode(encoded)?;
    if bytes.len() < CHECKSUM_LEN {
        return Err(BtcError::Format(format!(
            "base58check string decodes to {} bytes, shorter than its checksum",
            bytes.len()
        )));
    }

    let split = bytes.len() - CHECKSUM_LEN;
    if checksum(&bytes[..split]) != bytes[split..] {
        return Err(BtcError::Checksum);
    }
    bytes.truncate(split);
    Ok(bytes)
}
