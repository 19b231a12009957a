use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256: `SHA-256(SHA-256(data))`.
///
/// Used for transaction identifiers, signature digests, Base58Check
/// checksums and the chain-code tweak.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Hash160: RIPEMD-160(SHA-256(data)). Commits to public keys and redeem scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// First 4 bytes of the double SHA-256 of `data`.
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let digest = sha256d(data);
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}
