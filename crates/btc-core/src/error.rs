use crypto_utils::CryptoError;
use thiserror::Error;

/// Errors raised by the encoding, key and signing layers.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("malformed encoding: {0}")]
    Format(String),

    #[error("checksum mismatch")]
    Checksum,

    #[error("unsupported version byte 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("value {0} exceeds the supported range")]
    Overflow(u64),

    #[error("transaction parse failure: {0}")]
    Parse(String),

    #[error("unsupported signature hash type: {0}")]
    UnsupportedSigHash(String),

    #[error("chain derivation produced a zero scalar; retry with a different chain code")]
    DegenerateDerivation,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key has no private scalar")]
    MissingPrivateKey,

    #[error("signing error: {0}")]
    Signing(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
