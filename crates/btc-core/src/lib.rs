//! Bitcoin transaction and address core.
//!
//! Base58Check addresses and WIF keys, the legacy transaction wire format,
//! the signature digest, single-key and resumable M-of-N multisig signing,
//! and wallet impact analysis. Network parameters are always passed in
//! explicitly.

pub mod address;
pub mod analysis;
pub mod base58;
pub mod encoding;
pub mod error;
pub mod key;
pub mod network;
pub mod script;
pub mod sighash;
pub mod signing;
pub mod transaction;

pub use address::Address;
pub use analysis::{analyze, OwnedAddresses, TxAnalysis, TxKind, WalletLookup};
pub use error::BtcError;
pub use key::EcKey;
pub use network::{Network, NetworkParams};
pub use script::{Script, ScriptBuilder, ScriptType};
pub use sighash::{SigHashBase, SigHashType};
pub use signing::{MultisigState, MAX_REQUIRED_SIGNATURES};
pub use transaction::{Transaction, TxInput, TxMetadata, TxOutput};
