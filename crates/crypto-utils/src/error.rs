use thiserror::Error;

/// Hash and entropy primitive errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}
