//! Signature digest: the hash a signature over one input commits to.

use crypto_utils::hash::sha256d;

use crate::error::BtcError;
use crate::script::Script;
use crate::transaction::{Transaction, TxInput};

/// Base mode of a signature hash type (low five bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigHashBase {
    /// Commit to every output.
    All,
    /// Commit to no outputs.
    None,
    /// Commit to the output at the same index. Not supported yet.
    Single,
}

/// A signature hash type: base mode plus the ANYONECANPAY modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigHashType {
    pub base: SigHashBase,
    pub anyone_can_pay: bool,
}

impl SigHashType {
    pub const ALL: SigHashType = SigHashType {
        base: SigHashBase::All,
        anyone_can_pay: false,
    };

    pub const NONE: SigHashType = SigHashType {
        base: SigHashBase::None,
        anyone_can_pay: false,
    };

    pub const ANYONE_CAN_PAY_FLAG: u32 = 0x80;

    pub fn new(base: SigHashBase, anyone_can_pay: bool) -> Self {
        Self {
            base,
            anyone_can_pay,
        }
    }

    pub fn to_u32(self) -> u32 {
        let base = match self.base {
            SigHashBase::All => 0x01,
            SigHashBase::None => 0x02,
            SigHashBase::Single => 0x03,
        };
        if self.anyone_can_pay {
            base | Self::ANYONE_CAN_PAY_FLAG
        } else {
            base
        }
    }

    /// The single byte appended to a signature in an unlocking script.
    pub fn to_byte(self) -> u8 {
        self.to_u32() as u8
    }

    pub fn from_u32(value: u32) -> Result<Self, BtcError> {
        let base = match value & 0x1f {
            0x01 => SigHashBase::All,
            0x02 => SigHashBase::None,
            0x03 => SigHashBase::Single,
            _ => {
                return Err(BtcError::UnsupportedSigHash(format!(
                    "unknown hash type 0x{value:08x}"
                )))
            }
        };
        if value & !(0x1f | Self::ANYONE_CAN_PAY_FLAG) != 0 {
            return Err(BtcError::UnsupportedSigHash(format!(
                "unknown bits in hash type 0x{value:08x}"
            )));
        }
        Ok(Self::new(base, value & Self::ANYONE_CAN_PAY_FLAG != 0))
    }
}

impl Transaction {
    /// Digest for signing input `input_index` against `connected_script`
    /// (the spent output's locking script, or the redeem script being
    /// satisfied).
    ///
    /// Works on a copy: `self` is never modified. Metadata is not carried
    /// into the copy.
    pub fn hash_for_signature(
        &self,
        connected_script: &Script,
        input_index: usize,
        hash_type: SigHashType,
    ) -> Result<[u8; 32], BtcError> {
        if input_index >= self.inputs.len() {
            return Err(BtcError::InvalidArgument(format!(
                "input index {input_index} out of range for {} inputs",
                self.inputs.len()
            )));
        }
        if hash_type.base == SigHashBase::Single {
            return Err(BtcError::UnsupportedSigHash("SIGHASH_SINGLE".into()));
        }

        let mut inputs: Vec<TxInput> = self
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| TxInput {
                script: if i == input_index {
                    connected_script.clone()
                } else {
                    Script::new()
                },
                ..input.clone()
            })
            .collect();
        let mut outputs = self.outputs.clone();

        if hash_type.base == SigHashBase::None {
            outputs.clear();
            for (i, input) in inputs.iter_mut().enumerate() {
                if i != input_index {
                    input.sequence = 0;
                }
            }
        }

        if hash_type.anyone_can_pay {
            inputs = vec![inputs.swap_remove(input_index)];
        }

        let copy = Transaction {
            version: self.version,
            lock_time: self.lock_time,
            inputs,
            outputs,
            metadata: None,
        };

        let mut preimage = copy.serialize()?;
        preimage.extend_from_slice(&hash_type.to_u32().to_le_bytes());
        Ok(sha256d(&preimage))
    }
}
