//! How a transaction affects a set of owned addresses.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::address::Address;
use crate::error::BtcError;
use crate::network::NetworkParams;
use crate::script::Script;
use crate::transaction::Transaction;

/// Ownership and history lookups supplied by the wallet.
pub trait WalletLookup {
    /// Whether the wallet holds the key or script behind `hash`.
    fn owns_hash(&self, hash: &[u8; 20]) -> bool;

    /// Value of output `index` of the transaction with hash `prev_hash`, if
    /// the wallet has seen it.
    fn spent_output_value(&self, prev_hash: &[u8; 32], index: u32) -> Option<u64>;
}

/// In-memory [`WalletLookup`]: a set of owned hashes and the outputs of
/// previously recorded transactions.
#[derive(Debug, Clone, Default)]
pub struct OwnedAddresses {
    hashes: HashSet<[u8; 20]>,
    outputs: HashMap<([u8; 32], u32), u64>,
}

impl OwnedAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_address(&mut self, address: &Address) {
        self.hashes.insert(*address.hash());
    }

    pub fn add_hash(&mut self, hash: [u8; 20]) {
        self.hashes.insert(hash);
    }

    pub fn record_output(&mut self, prev_hash: [u8; 32], index: u32, value: u64) {
        self.outputs.insert((prev_hash, index), value);
    }

    /// Remember every output of `tx` so later spends of them can be valued.
    pub fn add_transaction(&mut self, tx: &Transaction) -> Result<(), BtcError> {
        let hash = tx.get_hash()?;
        for (index, output) in tx.outputs.iter().enumerate() {
            self.record_output(hash, index as u32, output.value);
        }
        Ok(())
    }
}

impl WalletLookup for OwnedAddresses {
    fn owns_hash(&self, hash: &[u8; 20]) -> bool {
        self.hashes.contains(hash)
    }

    fn spent_output_value(&self, prev_hash: &[u8; 32], index: u32) -> Option<u64> {
        self.outputs.get(&(*prev_hash, index)).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxKind {
    /// Net value flowed in. Carries the first owned receiving address.
    Received(Address),
    /// Every input is ours and some output is not. Carries the address of
    /// the first output, which may be change for foreign-built transactions.
    Sent(Option<Address>),
    /// Every input and every output is ours.
    Internal,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxAnalysis {
    pub kind: TxKind,
    /// Owned output value minus the known value of owned inputs.
    pub impact: i128,
}

impl TxAnalysis {
    /// Short human-readable summary; empty for [`TxKind::Other`].
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TxAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TxKind::Received(addr) => write!(f, "Received with {addr}"),
            TxKind::Sent(Some(addr)) => write!(f, "Payment to {addr}"),
            TxKind::Sent(None) => write!(f, "Payment to unknown script"),
            TxKind::Internal => write!(f, "Payment to yourself"),
            TxKind::Other => Ok(()),
        }
    }
}

#[derive(Clone, Copy)]
struct Destination {
    hash: [u8; 20],
    script_hash: bool,
}

impl Destination {
    fn of_output(script: &Script) -> Option<Self> {
        script
            .pubkey_hash()
            .map(|hash| Self {
                hash,
                script_hash: false,
            })
            .or_else(|| {
                script.script_hash().map(|hash| Self {
                    hash,
                    script_hash: true,
                })
            })
    }

    fn address(self, params: NetworkParams) -> Result<Address, BtcError> {
        let version = if self.script_hash {
            params.script_hash_version()
        } else {
            params.pubkey_hash_version()
        };
        Address::new(&self.hash, version, params)
    }
}

/// Classify `tx` against `wallet`.
///
/// Inputs are attributed through the public key revealed by their
/// unlocking script, or through the locking script they still hold when
/// unsigned. Inputs spending outputs the wallet has not recorded add
/// nothing to the impact.
pub fn analyze(
    tx: &Transaction,
    wallet: &impl WalletLookup,
    network: impl Into<NetworkParams>,
) -> Result<TxAnalysis, BtcError> {
    let params = network.into();
    let owned = |dest: &Option<Destination>| dest.is_some_and(|d| wallet.owns_hash(&d.hash));

    let destinations: Vec<Option<Destination>> = tx
        .outputs
        .iter()
        .map(|out| Destination::of_output(&out.script))
        .collect();
    let all_to_me = destinations.iter().all(owned);
    let first_owned = destinations.iter().flatten().copied().find(|d| wallet.owns_hash(&d.hash));

    let mut value_out: i128 = 0;
    for (output, dest) in tx.outputs.iter().zip(&destinations) {
        if owned(dest) {
            value_out += i128::from(output.value);
        }
    }

    let mut all_from_me = true;
    let mut value_in: i128 = 0;
    for input in &tx.inputs {
        let hash = input
            .script
            .input_pubkey_hash()
            .or_else(|| input.script.pubkey_hash());
        match hash {
            Some(hash) if wallet.owns_hash(&hash) => {
                if let Some(value) = wallet.spent_output_value(&input.prev_hash, input.prev_index) {
                    value_in += i128::from(value);
                }
            }
            _ => all_from_me = false,
        }
    }

    let impact = value_out - value_in;
    let kind = match first_owned {
        Some(dest) if impact > 0 => TxKind::Received(dest.address(params)?),
        _ if all_from_me && all_to_me => TxKind::Internal,
        _ if all_from_me => TxKind::Sent(
            destinations
                .first()
                .copied()
                .flatten()
                .map(|d| d.address(params))
                .transpose()?,
        ),
        _ => TxKind::Other,
    };

    Ok(TxAnalysis { kind, impact })
}
