//! # crypto-utils
//!
//! Hash primitives and the process-wide secure random source shared by the
//! Bitcoin transaction core.

pub mod error;
pub mod hash;
pub mod random;

pub use error::CryptoError;
