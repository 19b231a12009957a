//! Narrow script layer: immutable script values, a builder, chunk-level
//! parsing and the handful of standard templates the signing engine needs.
//!
//! This is not an interpreter. It only classifies scripts, extracts the
//! hashes they commit to and builds multisig redeem scripts.

use crypto_utils::hash::hash160;

use crate::error::BtcError;

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
}

use opcodes::*;

/// Largest key count a bare multisig redeem script can express with a
/// single small-integer opcode.
pub const MAX_MULTISIG_KEYS: usize = 16;

/// One parsed element of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A non-push opcode. `OP_0` is reported here, not as an empty push.
    Op(u8),
    /// Pushed data, regardless of which push opcode carried it.
    Push(Vec<u8>),
}

impl Chunk {
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Chunk::Push(data) => Some(data),
            Chunk::Op(_) => None,
        }
    }

    pub fn is_op(&self, op: u8) -> bool {
        matches!(self, Chunk::Op(o) if *o == op)
    }
}

/// Standard locking-script shapes recognised by [`Script::script_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    PubKeyHash,
    /// `OP_HASH160 <20> OP_EQUAL`
    ScriptHash,
    /// `<pubkey> OP_CHECKSIG`
    PubKey,
    Other,
}

/// An immutable script. Build new scripts with [`ScriptBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    /// The empty script.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, BtcError> {
        hex::decode(hex_str)
            .map(Self)
            .map_err(|e| BtcError::Format(format!("invalid script hex: {e}")))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Pay-to-pubkey-hash locking script.
    pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Self {
        ScriptBuilder::new()
            .push_op(OP_DUP)
            .push_op(OP_HASH160)
            .push_data(pubkey_hash)
            .push_op(OP_EQUALVERIFY)
            .push_op(OP_CHECKSIG)
            .build()
    }

    /// Pay-to-script-hash locking script.
    pub fn p2sh(script_hash: &[u8; 20]) -> Self {
        ScriptBuilder::new()
            .push_op(OP_HASH160)
            .push_data(script_hash)
            .push_op(OP_EQUAL)
            .build()
    }

    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`.
    pub fn multisig(required: usize, pubkeys: &[Vec<u8>]) -> Result<Self, BtcError> {
        if pubkeys.len() > MAX_MULTISIG_KEYS {
            return Err(BtcError::InvalidArgument(format!(
                "{} public keys exceed the multisig maximum of {MAX_MULTISIG_KEYS}",
                pubkeys.len()
            )));
        }
        if required > pubkeys.len() {
            return Err(BtcError::InvalidArgument(format!(
                "{required} required signatures but only {} public keys",
                pubkeys.len()
            )));
        }

        let mut builder = ScriptBuilder::new();
        builder.push_small_int(required as u8);
        for key in pubkeys {
            builder.push_data(key);
        }
        builder.push_small_int(pubkeys.len() as u8);
        builder.push_op(OP_CHECKMULTISIG);
        Ok(builder.build())
    }

    /// Parse into chunks. Fails with `Format` when a push runs past the end.
    pub fn chunks(&self) -> Result<Vec<Chunk>, BtcError> {
        let bytes = &self.0;
        let mut chunks = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let op = bytes[pos];
            pos += 1;

            let len = match op {
                0x01..=0x4b => op as usize,
                OP_PUSHDATA1 => {
                    let len = take(bytes, pos, 1)?[0] as usize;
                    pos += 1;
                    len
                }
                OP_PUSHDATA2 => {
                    let raw = take(bytes, pos, 2)?;
                    pos += 2;
                    u16::from_le_bytes([raw[0], raw[1]]) as usize
                }
                OP_PUSHDATA4 => {
                    let raw = take(bytes, pos, 4)?;
                    pos += 4;
                    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
                }
                _ => {
                    chunks.push(Chunk::Op(op));
                    continue;
                }
            };

            chunks.push(Chunk::Push(take(bytes, pos, len)?.to_vec()));
            pos += len;
        }

        Ok(chunks)
    }

    /// Classify this script as one of the standard locking templates.
    pub fn script_type(&self) -> ScriptType {
        let Ok(chunks) = self.chunks() else {
            return ScriptType::Other;
        };

        match chunks.as_slice() {
            [Chunk::Op(OP_DUP), Chunk::Op(OP_HASH160), Chunk::Push(h), Chunk::Op(OP_EQUALVERIFY), Chunk::Op(OP_CHECKSIG)]
                if h.len() == 20 =>
            {
                ScriptType::PubKeyHash
            }
            [Chunk::Op(OP_HASH160), Chunk::Push(h), Chunk::Op(OP_EQUAL)] if h.len() == 20 => {
                ScriptType::ScriptHash
            }
            [Chunk::Push(k), Chunk::Op(OP_CHECKSIG)] if k.len() == 33 || k.len() == 65 => {
                ScriptType::PubKey
            }
            _ => ScriptType::Other,
        }
    }

    /// The public key hash a locking script pays to: the embedded hash for
    /// pubkey-hash scripts, the Hash160 of the key for bare pubkey scripts.
    pub fn pubkey_hash(&self) -> Option<[u8; 20]> {
        let chunks = self.chunks().ok()?;
        match self.script_type() {
            ScriptType::PubKeyHash => chunks[2].data().and_then(to_hash20),
            ScriptType::PubKey => chunks[0].data().map(hash160),
            _ => None,
        }
    }

    /// The script hash embedded in a pay-to-script-hash locking script.
    pub fn script_hash(&self) -> Option<[u8; 20]> {
        if self.script_type() != ScriptType::ScriptHash {
            return None;
        }
        self.chunks().ok()?[1].data().and_then(to_hash20)
    }

    /// Hash160 of the public key revealed by a `<sig> <pubkey>` unlocking script.
    pub fn input_pubkey_hash(&self) -> Option<[u8; 20]> {
        match self.chunks().ok()?.as_slice() {
            [Chunk::Push(_sig), Chunk::Push(pubkey)] => Some(hash160(pubkey)),
            _ => None,
        }
    }

    /// The `m` of an `m`-of-`n` redeem script, read from its leading
    /// small-integer opcode.
    pub fn multisig_required(&self) -> Result<usize, BtcError> {
        match self.chunks()?.first() {
            Some(Chunk::Op(op)) if (OP_1..=OP_16).contains(op) => Ok((op - OP_1 + 1) as usize),
            _ => Err(BtcError::InvalidArgument(
                "redeem script does not start with a required-signature count".into(),
            )),
        }
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn take(bytes: &[u8], pos: usize, len: usize) -> Result<&[u8], BtcError> {
    pos.checked_add(len)
        .and_then(|end| bytes.get(pos..end))
        .ok_or_else(|| {
            BtcError::Format(format!(
                "script push of {len} bytes at offset {pos} overruns {} byte script",
                bytes.len()
            ))
        })
}

fn to_hash20(data: &[u8]) -> Option<[u8; 20]> {
    data.try_into().ok()
}

/// Appends opcodes and minimally-encoded data pushes.
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_op(&mut self, op: u8) -> &mut Self {
        self.bytes.push(op);
        self
    }

    /// Push `data` with the shortest push opcode able to carry it.
    pub fn push_data(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.bytes.push(len as u8);
        } else if len <= 0xff {
            self.bytes.push(OP_PUSHDATA1);
            self.bytes.push(len as u8);
        } else if len <= 0xffff {
            self.bytes.push(OP_PUSHDATA2);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.bytes.push(OP_PUSHDATA4);
            self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    /// Push 0..=16 as `OP_0` / `OP_1`..`OP_16`.
    pub fn push_small_int(&mut self, n: u8) -> &mut Self {
        debug_assert!(n as usize <= MAX_MULTISIG_KEYS);
        if n == 0 {
            self.push_op(OP_0)
        } else {
            self.push_op(OP_1 + n - 1)
        }
    }

    pub fn push_chunk(&mut self, chunk: &Chunk) -> &mut Self {
        match chunk {
            Chunk::Op(op) => self.push_op(*op),
            Chunk::Push(data) => self.push_data(data),
        }
    }

    pub fn build(&self) -> Script {
        Script(self.bytes.clone())
    }
}
