//! Binary codec shared by the block and transaction framing.
//!
//! Three integer encodings coexist on the wire:
//!
//! - fixed-width big-endian integers (`read_uint` / `dec_to_bin`);
//! - the variable length prefix (`decode_length` / `encode_length`): one
//!   byte below 0x80 is the length itself, otherwise the low seven bits
//!   give the count of big-endian length bytes that follow;
//! - length-prefixed signed 64 (`decode_len_i64` / `encode_len_i64`): one
//!   count byte followed by that many little-endian two's-complement bytes,
//!   trailing zeros trimmed.
//!
//! Every reader fails with `MalformedFrame` on underflow and with
//! `OversizedTx` when a decoded length exceeds `MAX_TX_SIZE`.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::consts::MAX_TX_SIZE;
use crate::error::BlockError;

/// Cursor over an input frame. All reads consume from the front.
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remaining unread input.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    /// Consume exactly `n` bytes.
    pub fn next(&mut self, n: usize) -> Result<&'a [u8], BlockError> {
        if self.buf.len() < n {
            return Err(BlockError::MalformedFrame(format!(
                "need {} bytes, have {}",
                n,
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8, BlockError> {
        Ok(self.next(1)?[0])
    }

    /// Big-endian unsigned integer of `n` bytes, 1..=8.
    pub fn read_uint(&mut self, n: usize) -> Result<u64, BlockError> {
        if n == 0 || n > 8 {
            return Err(BlockError::MalformedFrame(format!(
                "unsupported int width {}",
                n
            )));
        }
        let bytes = self.next(n)?;
        let mut v = 0u64;
        for b in bytes {
            v = (v << 8) | u64::from(*b);
        }
        Ok(v)
    }

    /// Decode the variable length prefix.
    pub fn decode_length(&mut self) -> Result<usize, BlockError> {
        let first = self.read_u8()?;
        let len = if first & 0x80 != 0 {
            let n = (first & 0x7F) as usize;
            if n == 0 || n > 8 {
                return Err(BlockError::MalformedFrame(format!(
                    "bad length prefix 0x{:02x}",
                    first
                )));
            }
            self.read_uint(n)? as usize
        } else {
            first as usize
        };
        if len > MAX_TX_SIZE {
            return Err(BlockError::OversizedTx {
                size: len,
                max: MAX_TX_SIZE,
            });
        }
        Ok(len)
    }

    /// Decode a length-prefixed signed 64-bit integer.
    pub fn decode_len_i64(&mut self) -> Result<i64, BlockError> {
        let n = self.read_u8()? as usize;
        if n > 8 {
            return Err(BlockError::MalformedFrame(format!(
                "bad int64 length {}",
                n
            )));
        }
        let bytes = self.next(n)?;
        let mut buf = [0u8; 8];
        buf[..n].copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64, BlockError> {
        self.read_uint(8)
    }

    pub fn read_f64(&mut self) -> Result<f64, BlockError> {
        Ok(f64::from_bits(self.read_uint(8)?))
    }

    /// Length-prefixed byte slice.
    pub fn read_byte_slice(&mut self) -> Result<&'a [u8], BlockError> {
        let len = self.decode_length()?;
        self.next(len)
    }

    pub fn read_string(&mut self) -> Result<String, BlockError> {
        let bytes = self.read_byte_slice()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// A decimal travels as a length-prefixed string.
    pub fn read_decimal(&mut self) -> Result<Decimal, BlockError> {
        let s = self.read_string()?;
        Decimal::from_str(&s)
            .map_err(|e| BlockError::MalformedFrame(format!("bad decimal {:?}: {}", s, e)))
    }

    /// A list is a length-prefixed count of length-prefixed strings.
    pub fn read_list(&mut self) -> Result<Vec<String>, BlockError> {
        let mut count = self.decode_length()?;
        let mut list = Vec::new();
        while count > 0 {
            let len = self.decode_length()?;
            if self.len() < len {
                return Err(BlockError::MalformedFrame("input slice is short".into()));
            }
            list.push(String::from_utf8_lossy(self.next(len)?).into_owned());
            count -= 1;
        }
        Ok(list)
    }
}

/// Encode the variable length prefix.
pub fn encode_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let be = (len as u64).to_be_bytes();
    let skip = be.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (8 - skip) as u8);
    out.extend_from_slice(&be[skip..]);
}

/// Length prefix followed by the data itself.
pub fn encode_length_plus_data(out: &mut Vec<u8>, data: &[u8]) {
    encode_length(out, data.len());
    out.extend_from_slice(data);
}

/// Encode a length-prefixed signed 64-bit integer.
pub fn encode_len_i64(out: &mut Vec<u8>, v: i64) {
    let le = v.to_le_bytes();
    let mut n = 8;
    while n > 0 && le[n - 1] == 0 {
        n -= 1;
    }
    out.push(n as u8);
    out.extend_from_slice(&le[..n]);
}

/// Fixed-width big-endian integer.
pub fn dec_to_bin(out: &mut Vec<u8>, v: u64, size: usize) {
    let be = v.to_be_bytes();
    out.extend_from_slice(&be[8 - size..]);
}

/// Split a legacy transaction body into its field slices.
///
/// The legacy dialect carries `time:u32` followed by varlen-framed fields.
/// The first two output slices are placeholders (hash, type) kept for
/// positional compatibility; the third is the ASCII decimal time.
pub fn split_legacy_frames(data: &[u8]) -> Result<Vec<Vec<u8>>, BlockError> {
    let mut r = ByteReader::new(data);
    let mut slices: Vec<Vec<u8>> = vec![Vec::new(), Vec::new()];
    let time = r.read_uint(4)?;
    slices.push(time.to_string().into_bytes());

    if r.is_empty() {
        return Err(BlockError::MalformedFrame("incorrect tx".into()));
    }

    while !r.is_empty() {
        let len = r.decode_length()?;
        if len > r.len() {
            return Err(BlockError::MalformedFrame(format!(
                "field len {} exceeds remaining {}",
                len,
                r.len()
            )));
        }
        if len > 0 {
            slices.push(r.next(len)?.to_vec());
            continue;
        }
        if r.is_empty() {
            break;
        }
        slices.push(Vec::new());
    }

    Ok(slices)
}
