// Variable-length integers for the patch format.
//
// Base-128, least-significant group first (LEB128): each byte carries 7
// data bits, bit 7 set means more bytes follow. Signed values are zig-zag
// mapped first so small negative deltas stay short.

use std::io::{self, Read};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u64` into `buf`, returning the number of bytes used (1..=10).
/// The encoding occupies `buf[..len]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let byte = (num & 0x7F) as u8;
        num >>= 7;
        if num == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

/// Map a signed value onto an unsigned one: 0, -1, 1, -2, ... -> 0, 1, 2, 3, ...
#[inline]
pub fn zigzag_encode(num: i64) -> u64 {
    ((num << 1) ^ (num >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(num: u64) -> i64 {
    ((num >> 1) as i64) ^ -((num & 1) as i64)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Fold the `index`-th group into `val`, rejecting anything that does not
/// fit in 64 bits.
#[inline]
fn accumulate(val: u64, index: usize, byte: u8) -> Result<u64, VarIntError> {
    let group = u64::from(byte & 0x7F);
    match index {
        0..=8 => Ok(val | (group << (7 * index))),
        // The tenth group holds only bit 63 and must terminate.
        9 if group <= 1 && byte & 0x80 == 0 => Ok(val | (group << 63)),
        _ => Err(VarIntError::Overflow),
    }
}

/// Read a `u64` varint from a streaming source.
///
/// A source that ends mid-integer yields `UnexpectedEof`; an integer that
/// does not fit wraps [`VarIntError::Overflow`] in `InvalidData`.
pub fn stream_read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut val: u64 = 0;
    let mut buf = [0u8; 1];
    for i in 0..MAX_VARINT_LEN {
        r.read_exact(&mut buf)?;
        let byte = buf[0];
        val = accumulate(val, i, byte)?;
        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }
    Err(VarIntError::Overflow.into())
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    /// Value would overflow 64 bits.
    #[error("varint overflow")]
    Overflow,
}

impl From<VarIntError> for io::Error {
    fn from(e: VarIntError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
