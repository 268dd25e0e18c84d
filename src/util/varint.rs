//! Variable-length integer encoding.
//!
//! Seven payload bits per byte, least significant group first, high bit set
//! on every byte except the last. Term lists and postings are stored this
//! way; [`VarIntCursor`] decodes them straight out of a mapped slice.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;

use crate::error::{QuiverError, Result};

/// Append the encoding of `value` to `out`, returning the number of bytes written.
pub fn encode_u64_into(value: u64, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80;
        }

        out.push(byte);

        if val == 0 {
            break;
        }
    }

    out.len() - start
}

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    encode_u64_into(value, &mut bytes);
    bytes
}

/// Decode a u64 value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(QuiverError::corrupt("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(QuiverError::corrupt("Incomplete VarInt"))
}

/// Write a variable-length encoded u64 to a writer.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = encode_u64(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Read a variable-length encoded u64 from a reader.
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    loop {
        let byte = reader.read_u8()?;

        if shift >= 64 {
            return Err(QuiverError::corrupt("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}

/// Sequential decoder over an in-memory (usually mapped) byte slice.
#[derive(Debug, Clone)]
pub struct VarIntCursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> VarIntCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        VarIntCursor { bytes, position: 0 }
    }

    /// Decode the next value.
    pub fn next_u64(&mut self) -> Result<u64> {
        let (value, read) = decode_u64(&self.bytes[self.position..])?;
        self.position += read;
        Ok(value)
    }

    /// Decode `count` values into a vector.
    pub fn take_u64s(&mut self, count: usize) -> Result<Vec<u64>> {
        let mut values = Vec::with_capacity(count.min(self.bytes.len() - self.position));
        for _ in 0..count {
            values.push(self.next_u64()?);
        }
        Ok(values)
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
