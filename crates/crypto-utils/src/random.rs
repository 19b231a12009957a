use std::sync::OnceLock;

use rand::RngCore;
use rand_core::OsRng;

use crate::error::CryptoError;

/// Outcome of the one-time entropy probe, shared by the whole process.
static ENTROPY_READY: OnceLock<Result<(), String>> = OnceLock::new();

/// Confirms the operating system entropy source can be read.
///
/// The probe runs once per process; later calls return the cached outcome.
/// Every key-generating entry point calls this before drawing randomness.
pub fn ensure_entropy() -> Result<(), CryptoError> {
    ENTROPY_READY
        .get_or_init(|| {
            let mut probe = [0u8; 32];
            OsRng
                .try_fill_bytes(&mut probe)
                .map_err(|e| e.to_string())?;
            log::debug!("OS entropy source initialised");
            Ok(())
        })
        .clone()
        .map_err(CryptoError::EntropyUnavailable)
}

/// Generates `len` cryptographically secure random bytes.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
    ensure_entropy()?;
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))?;
    Ok(buf)
}

/// Generates a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes_fixed<const N: usize>() -> Result<[u8; N], CryptoError> {
    ensure_entropy()?;
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))?;
    Ok(buf)
}

/// Handle to the process-wide secure RNG for APIs that take an `RngCore`.
///
/// Fails if the entropy source could not be initialised.
pub fn secure_rng() -> Result<OsRng, CryptoError> {
    ensure_entropy()?;
    Ok(OsRng)
}
