//! Little-endian wire primitives: the variable-length integer and a cursor
//! over a byte slice.

use crate::error::BtcError;

/// Largest value the variable-length integer encoding accepts.
pub const MAX_VARINT: u64 = u32::MAX as u64;

/// Append `value` as a variable-length integer.
///
/// Values above `u32::MAX` would need the 8-byte form, which is not
/// supported and fails with `Overflow` instead of being truncated.
pub fn write_varint(buf: &mut Vec<u8>, value: u64) -> Result<(), BtcError> {
    if value < 0xFD {
        buf.push(value as u8);
    } else if value <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= MAX_VARINT {
        buf.push(0xFE);
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        return Err(BtcError::Overflow(value));
    }
    Ok(())
}

/// Cursor over wire bytes. Every read past the end is a `Parse` failure.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], BtcError> {
        if n > self.remaining() {
            return Err(BtcError::Parse(format!(
                "need {n} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BtcError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, BtcError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, BtcError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, BtcError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, BtcError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, BtcError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a variable-length integer. The 8-byte form is read through so
    /// the caller sees the value, then rejected with `Overflow`.
    pub fn read_varint(&mut self) -> Result<u64, BtcError> {
        match self.read_u8()? {
            0xFD => Ok(self.read_u16()? as u64),
            0xFE => Ok(self.read_u32()? as u64),
            0xFF => Err(BtcError::Overflow(self.read_u64()?)),
            b => Ok(b as u64),
        }
    }

    /// Read an element count. Only the single-byte form is accepted, which
    /// bounds how many elements a hostile buffer can make us allocate.
    pub fn read_count(&mut self, what: &str) -> Result<usize, BtcError> {
        let offset = self.pos;
        let marker = self.read_u8()?;
        if marker >= 0xFD {
            return Err(BtcError::Parse(format!(
                "{what} count at offset {offset} uses a multi-byte encoding (marker 0x{marker:02x})"
            )));
        }
        Ok(marker as usize)
    }
}
