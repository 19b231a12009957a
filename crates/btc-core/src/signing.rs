//! Signing engine: single-key pubkey-hash spends and resumable M-of-N
//! script-hash spends.
//!
//! A multisig input moves through these states across signing rounds:
//!
//! ```text
//! Unsigned        HASH160 <hash160(redeem)> EQUAL
//! Template        OP_0 OP_0{M} <redeem>
//! PartiallySigned OP_0 <sig>{k} OP_0{M-k} <redeem>   (signatures in any slot)
//! FullySigned     OP_0 <sig>{M} <redeem>
//! ```
//!
//! Each round only fills empty slots, so rounds run on separate copies of a
//! transaction with different key subsets always converge.

use crypto_utils::hash::hash160;
use log::{debug, trace};

use crate::error::BtcError;
use crate::key::{verify_signature, EcKey};
use crate::script::{opcodes::OP_0, Chunk, Script, ScriptBuilder};
use crate::sighash::SigHashType;
use crate::transaction::Transaction;

/// Most signatures a redeem script may require before the engine refuses
/// to sign it.
pub const MAX_REQUIRED_SIGNATURES: usize = 3;

/// Where one input stands with respect to a given redeem script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultisigState {
    /// The input does not spend this redeem script.
    Unrelated,
    /// Still the script-hash locking script.
    Unsigned,
    /// Template installed, no signatures yet.
    Template,
    /// Holds this many of the required signatures.
    PartiallySigned(usize),
    FullySigned,
}

type Slots = Vec<Option<Vec<u8>>>;

impl Transaction {
    /// Sign every input whose script slot pays to `key`'s pubkey hash.
    ///
    /// Each matching input gets `<sig ++ hash_type> <pubkey>`, replacing
    /// whatever it held. Returns how many inputs were signed.
    pub fn sign_with_key(&mut self, key: &EcKey) -> Result<usize, BtcError> {
        let hash_type = SigHashType::ALL;
        let mut signed = 0;

        for index in 0..self.inputs.len() {
            if self.inputs[index].script.pubkey_hash().as_ref() != Some(key.pubkey_hash()) {
                continue;
            }

            let connected = self.inputs[index].script.clone();
            let digest = self.hash_for_signature(&connected, index, hash_type)?;
            let mut signature = key.sign(&digest)?;
            signature.push(hash_type.to_byte());

            self.inputs[index].script = ScriptBuilder::new()
                .push_data(&signature)
                .push_data(key.public_key())
                .build();
            debug!("signed input {index} with key {}", hex::encode(key.pubkey_hash()));
            signed += 1;
        }

        Ok(signed)
    }

    /// Add signatures from `keys` to every input spending `redeem`.
    ///
    /// Inputs still holding the script-hash locking script are first turned
    /// into the empty template. Empty slots are then filled left to right,
    /// each from the next usable key. A key is skipped when it has no private
    /// scalar, is not named in the redeem script, or already produced one of
    /// the input's signatures. Returns the number of signatures added; zero
    /// is not an error.
    pub fn sign_with_multisig(&mut self, keys: &[EcKey], redeem: &Script) -> Result<usize, BtcError> {
        let required = checked_required(redeem)?;
        let redeem_pubkeys: Vec<Vec<u8>> = redeem
            .chunks()?
            .into_iter()
            .filter_map(|chunk| match chunk {
                Chunk::Push(data) => Some(data),
                Chunk::Op(_) => None,
            })
            .collect();
        let redeem_hash = hash160(redeem.as_bytes());
        let hash_type = SigHashType::ALL;
        let mut installed = 0;

        for index in 0..self.inputs.len() {
            if self.inputs[index].script.script_hash() == Some(redeem_hash) {
                self.inputs[index].script = assemble(&vec![None; required], redeem);
                debug!("input {index}: installed {required}-signature multisig template");
            }

            let Some(mut slots) = template_slots(&self.inputs[index].script, required, redeem) else {
                continue;
            };
            if slots.iter().all(Option::is_some) {
                continue;
            }

            let digest = self.hash_for_signature(redeem, index, hash_type)?;
            let mut candidates = keys.iter();
            let mut added = 0;

            for slot in 0..required {
                if slots[slot].is_some() {
                    continue;
                }

                for key in candidates.by_ref() {
                    if !key.has_private_key()
                        || !redeem_pubkeys.iter().any(|pk| key.matches_public_key(pk))
                    {
                        continue;
                    }
                    if slots.iter().flatten().any(|sig| signed_by(key, &digest, sig)) {
                        trace!("input {index}: key already signed, skipping");
                        continue;
                    }

                    let mut signature = key.sign(&digest)?;
                    signature.push(hash_type.to_byte());
                    if slots.iter().flatten().any(|sig| *sig == signature) {
                        trace!("input {index}: duplicate signature rejected");
                        continue;
                    }

                    trace!("input {index}: filled slot {slot}");
                    slots[slot] = Some(signature);
                    added += 1;
                    break;
                }

                if slots[slot].is_none() {
                    trace!("input {index}: slot {slot} left empty");
                }
            }

            if added > 0 {
                self.inputs[index].script = assemble(&slots, redeem);
                debug!(
                    "input {index}: added {added} signature(s), {}/{required} present",
                    slots.iter().flatten().count()
                );
                installed += added;
            }
        }

        Ok(installed)
    }

    /// Classify input `input_index` against `redeem`.
    pub fn multisig_state(&self, input_index: usize, redeem: &Script) -> Result<MultisigState, BtcError> {
        let input = self.inputs.get(input_index).ok_or_else(|| {
            BtcError::InvalidArgument(format!(
                "input index {input_index} out of range for {} inputs",
                self.inputs.len()
            ))
        })?;

        if input.script.script_hash() == Some(hash160(redeem.as_bytes())) {
            return Ok(MultisigState::Unsigned);
        }

        let required = redeem.multisig_required()?;
        let Some(slots) = template_slots(&input.script, required, redeem) else {
            return Ok(MultisigState::Unrelated);
        };

        Ok(match slots.iter().flatten().count() {
            0 => MultisigState::Template,
            n if n == required => MultisigState::FullySigned,
            n => MultisigState::PartiallySigned(n),
        })
    }

    /// Check `signature` (DER plus trailing hash-type byte) for input
    /// `input_index` against `connected_script` and `pubkey`.
    pub fn verify_input_signature(
        &self,
        input_index: usize,
        connected_script: &Script,
        pubkey: &[u8],
        signature: &[u8],
    ) -> Result<bool, BtcError> {
        let Some((&hash_type, der)) = signature.split_last() else {
            return Ok(false);
        };
        let hash_type = SigHashType::from_u32(hash_type as u32)?;
        let digest = self.hash_for_signature(connected_script, input_index, hash_type)?;
        Ok(verify_signature(pubkey, &digest, der))
    }
}

fn checked_required(redeem: &Script) -> Result<usize, BtcError> {
    let required = redeem.multisig_required()?;
    if required > MAX_REQUIRED_SIGNATURES {
        return Err(BtcError::InvalidArgument(format!(
            "redeem script requires {required} signatures, at most {MAX_REQUIRED_SIGNATURES} are supported"
        )));
    }
    Ok(required)
}

/// Slots of a script in template shape for `redeem`, or `None` if the
/// script has some other shape.
fn template_slots(script: &Script, required: usize, redeem: &Script) -> Option<Slots> {
    let chunks = script.chunks().ok()?;
    if chunks.len() != required + 2 || !chunks[0].is_op(OP_0) {
        return None;
    }
    match chunks.last() {
        Some(Chunk::Push(data)) if data.as_slice() == redeem.as_bytes() => {}
        _ => return None,
    }

    chunks[1..=required]
        .iter()
        .map(|chunk| match chunk {
            Chunk::Op(OP_0) => Some(None),
            Chunk::Push(sig) => Some(Some(sig.clone())),
            Chunk::Op(_) => None,
        })
        .collect()
}

fn assemble(slots: &[Option<Vec<u8>>], redeem: &Script) -> Script {
    let mut builder = ScriptBuilder::new();
    builder.push_op(OP_0);
    for slot in slots {
        match slot {
            Some(sig) => builder.push_data(sig),
            None => builder.push_op(OP_0),
        };
    }
    builder.push_data(redeem.as_bytes());
    builder.build()
}

fn signed_by(key: &EcKey, digest: &[u8; 32], signature: &[u8]) -> bool {
    signature
        .split_last()
        .is_some_and(|(_, der)| key.verify(digest, der))
}
