//! Transaction model and its canonical wire encoding.
//!
//! ```text
//! version:4 in_count:varint
//!   { prev_hash:32 prev_index:4 script_len:varint script sequence:4 } * in_count
//! out_count:varint
//!   { value:8 script_len:varint script } * out_count
//! lock_time:4
//! ```
//!
//! All multi-byte integers are little-endian.

use crypto_utils::hash::sha256d;
use log::debug;

use crate::address::Address;
use crate::encoding::{write_varint, ByteReader};
use crate::error::BtcError;
use crate::script::Script;

/// Sequence number of a final input.
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Version used by [`Transaction::new`].
pub const DEFAULT_VERSION: i32 = 1;

/// Reference to a previous output plus the script slot that will hold the
/// unlocking script.
///
/// Before signing, the script slot holds the locking script of the output
/// being spent; the signing engine reads it to decide which key applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Previous transaction hash in wire (internal) byte order.
    pub prev_hash: [u8; 32],
    pub prev_index: u32,
    pub script: Script,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script: Script,
}

/// Where a transaction was seen. Informational only: never serialized,
/// never hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxMetadata {
    pub hash: Option<[u8; 32]>,
    pub timestamp: Option<u64>,
    pub block_height: Option<u32>,
    pub block_hash: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub lock_time: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub metadata: Option<TxMetadata>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// Empty version-1 transaction with lock time 0.
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
            lock_time: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            metadata: None,
        }
    }

    pub fn add_input(&mut self, input: TxInput) -> &mut Self {
        self.inputs.push(input);
        self
    }

    /// Spend `prev_index` of `prev_hash`, whose locking script is
    /// `spent_script`. The locking script goes in the input's script slot
    /// until the input is signed.
    pub fn add_input_spending(
        &mut self,
        prev_hash: [u8; 32],
        prev_index: u32,
        spent_script: Script,
    ) -> &mut Self {
        self.add_input(TxInput {
            prev_hash,
            prev_index,
            script: spent_script,
            sequence: DEFAULT_SEQUENCE,
        })
    }

    pub fn add_output(&mut self, output: TxOutput) -> &mut Self {
        self.outputs.push(output);
        self
    }

    /// Pay `value` to `address`.
    pub fn add_output_to(&mut self, address: &Address, value: u64) -> &mut Self {
        self.add_output(TxOutput {
            value,
            script: address.script_pubkey(),
        })
    }

    /// Sum of all output values. Fails with `Overflow` instead of wrapping.
    pub fn total_output_value(&self) -> Result<u64, BtcError> {
        self.outputs.iter().try_fold(0u64, |acc, out| {
            acc.checked_add(out.value)
                .ok_or(BtcError::Overflow(u64::MAX))
        })
    }

    /// Canonical wire bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, BtcError> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        buf.extend_from_slice(&self.version.to_le_bytes());

        write_varint(&mut buf, self.inputs.len() as u64)?;
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_hash);
            buf.extend_from_slice(&input.prev_index.to_le_bytes());
            write_varint(&mut buf, input.script.len() as u64)?;
            buf.extend_from_slice(input.script.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_varint(&mut buf, self.outputs.len() as u64)?;
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_varint(&mut buf, output.script.len() as u64)?;
            buf.extend_from_slice(output.script.as_bytes());
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        Ok(buf)
    }

    /// Parse canonical wire bytes.
    ///
    /// Input and output counts must fit the single-byte varint form; larger
    /// counts, truncation and trailing bytes are all `Parse` failures.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, BtcError> {
        Self::read(bytes).inspect_err(|e| debug!("rejected {} byte transaction: {e}", bytes.len()))
    }

    fn read(bytes: &[u8]) -> Result<Self, BtcError> {
        let mut reader = ByteReader::new(bytes);
        let version = reader.read_i32()?;

        let input_count = reader.read_count("input")?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let prev_hash = reader.read_array::<32>()?;
            let prev_index = reader.read_u32()?;
            let script = read_script(&mut reader)?;
            let sequence = reader.read_u32()?;
            inputs.push(TxInput {
                prev_hash,
                prev_index,
                script,
                sequence,
            });
        }

        let output_count = reader.read_count("output")?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = reader.read_u64()?;
            let script = read_script(&mut reader)?;
            outputs.push(TxOutput { value, script });
        }

        let lock_time = reader.read_u32()?;
        if reader.remaining() != 0 {
            return Err(BtcError::Parse(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }

        Ok(Self {
            version,
            lock_time,
            inputs,
            outputs,
            metadata: None,
        })
    }

    /// Double SHA-256 of the wire bytes, in internal byte order.
    pub fn get_hash(&self) -> Result<[u8; 32], BtcError> {
        Ok(sha256d(&self.serialize()?))
    }

    /// Transaction id as conventionally displayed (byte-reversed hash).
    pub fn txid_hex(&self) -> Result<String, BtcError> {
        let mut hash = self.get_hash()?;
        hash.reverse();
        Ok(hex::encode(hash))
    }

    pub fn to_hex(&self) -> Result<String, BtcError> {
        Ok(hex::encode(self.serialize()?))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, BtcError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| BtcError::Parse(format!("invalid transaction hex: {e}")))?;
        Self::deserialize(&bytes)
    }

    fn estimated_size(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(|i| 41 + i.script.len()).sum();
        let outputs: usize = self.outputs.iter().map(|o| 9 + o.script.len()).sum();
        10 + inputs + outputs
    }
}

fn read_script(reader: &mut ByteReader<'_>) -> Result<Script, BtcError> {
    let len = reader.read_varint()?;
    let len = usize::try_from(len)
        .map_err(|_| BtcError::Parse(format!("script length {len} does not fit in memory")))?;
    Ok(Script::from_bytes(reader.read_bytes(len)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input_spending([0xab; 32], 0, Script::p2pkh(&[0x11; 20]))
            .add_input(TxInput {
                prev_hash: [0xcd; 32],
                prev_index: 7,
                script: Script::new(),
                sequence: 0,
            })
            .add_output(TxOutput {
                value: 100_000,
                script: Script::p2pkh(&[0x22; 20]),
            })
            .add_output(TxOutput {
                value: 5_000,
                script: Script::p2sh(&[0x33; 20]),
            });
        tx.lock_time = 500_000;
        tx
    }

    #[test]
    fn empty_transaction_layout() {
        let tx = Transaction::new();
        assert_eq!(tx.to_hex().unwrap(), "01000000000000000000");
    }

    #[test]
    fn serialize_layout() {
        let tx = sample_tx();
        let bytes = tx.serialize().unwrap();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(bytes[4], 2);
        assert_eq!(&bytes[5..37], &[0xab; 32]);
        assert_eq!(&bytes[37..41], &[0, 0, 0, 0]);
        assert_eq!(bytes[41], 25);
        assert_eq!(&bytes[67..71], &[0xff; 4]);
        assert_eq!(&bytes[bytes.len() - 4..], &500_000u32.to_le_bytes());
    }

    #[test]
    fn roundtrip_preserves_fields_and_bytes() {
        let tx = sample_tx();
        let bytes = tx.serialize().unwrap();
        let parsed = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.serialize().unwrap(), bytes);
    }

    #[test]
    fn negative_version_roundtrips() {
        let mut tx = sample_tx();
        tx.version = -1;
        let parsed = Transaction::from_hex(&tx.to_hex().unwrap()).unwrap();
        assert_eq!(parsed.version, -1);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = sample_tx().serialize().unwrap();
        bytes.push(0);
        assert!(matches!(Transaction::deserialize(&bytes), Err(BtcError::Parse(_))));
    }

    #[test]
    fn truncated_bytes_rejected() {
        let bytes = sample_tx().serialize().unwrap();
        for cut in [0, 3, 5, 40, bytes.len() - 1] {
            assert!(
                matches!(Transaction::deserialize(&bytes[..cut]), Err(BtcError::Parse(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn multi_byte_counts_rejected() {
        // version, then an input count using the 0xFD form
        let bytes = hex::decode("01000000fd0100").unwrap();
        assert!(matches!(Transaction::deserialize(&bytes), Err(BtcError::Parse(_))));

        // zero inputs, then an output count using the 0xFE form
        let bytes = hex::decode("0100000000fe01000000").unwrap();
        assert!(matches!(Transaction::deserialize(&bytes), Err(BtcError::Parse(_))));
    }

    #[test]
    fn script_length_varint_forms_accepted() {
        let mut tx = Transaction::new();
        tx.add_output(TxOutput {
            value: 1,
            script: Script::from_bytes(&[0x6a; 300]),
        });
        let bytes = tx.serialize().unwrap();
        assert_eq!(&bytes[14..17], &[0xFD, 0x2C, 0x01]);
        assert_eq!(Transaction::deserialize(&bytes).unwrap(), tx);
    }

    #[test]
    fn metadata_excluded_from_hash() {
        let tx = sample_tx();
        let mut tagged = tx.clone();
        tagged.metadata = Some(TxMetadata {
            hash: Some([9; 32]),
            timestamp: Some(1_700_000_000),
            block_height: Some(800_000),
            block_hash: None,
        });
        assert_eq!(tagged.serialize().unwrap(), tx.serialize().unwrap());
        assert_eq!(tagged.get_hash().unwrap(), tx.get_hash().unwrap());
    }

    #[test]
    fn clone_does_not_alias_scripts() {
        let tx = sample_tx();
        let mut copy = tx.clone();
        copy.inputs[0].script = Script::new();
        assert_eq!(tx.inputs[0].script, Script::p2pkh(&[0x11; 20]));
    }

    #[test]
    fn txid_is_reversed_hash() {
        let tx = sample_tx();
        let mut hash = tx.get_hash().unwrap();
        hash.reverse();
        assert_eq!(tx.txid_hex().unwrap(), hex::encode(hash));
    }

    #[test]
    fn add_output_to_address() {
        let addr = Address::new(&[0x44; 20], 0x05, Network::Mainnet).unwrap();
        let mut tx = Transaction::new();
        tx.add_output_to(&addr, 42);
        assert_eq!(tx.outputs[0].script, Script::p2sh(&[0x44; 20]));
        assert_eq!(tx.outputs[0].value, 42);
    }

    #[test]
    fn total_output_value_checked() {
        assert_eq!(sample_tx().total_output_value().unwrap(), 105_000);

        let mut tx = Transaction::new();
        for _ in 0..2 {
            tx.add_output(TxOutput {
                value: u64::MAX,
                script: Script::new(),
            });
        }
        assert!(matches!(tx.total_output_value(), Err(BtcError::Overflow(_))));
    }

    #[test]
    fn bad_hex_is_parse_error() {
        assert!(matches!(Transaction::from_hex("xyz"), Err(BtcError::Parse(_))));
    }
}
