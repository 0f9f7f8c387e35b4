// Opcode byte packing.
//
//   bit 0     kind: 0 = Copy, 1 = Insert
//   bits 1..7 inline length 1..=126, or 127 = length follows as a varint
//
// 0x00 (Copy with length 0) is the end-of-instructions marker; 0x01 (Insert
// with length 0) is never produced and rejected on input.

/// End-of-instructions marker.
pub const OP_END: u8 = 0x00;

/// Largest length stored inside the opcode byte.
pub const MAX_INLINE_LEN: u64 = 126;

/// Length field value meaning "an explicit varint length follows".
pub const LEN_FOLLOWS: u8 = 127;

const KIND_INSERT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Copy,
    Insert,
}

/// A decoded opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    End,
    /// `len` is `None` when an explicit varint length follows.
    Op { kind: Kind, len: Option<u64> },
}

/// Build the opcode byte for an instruction of `len` bytes (`len > 0`).
/// Returns the byte and whether an explicit length must follow.
#[inline]
pub fn encode(kind: Kind, len: u64) -> (u8, bool) {
    debug_assert!(len > 0, "zero-length instructions are never encoded");
    let k = match kind {
        Kind::Copy => 0,
        Kind::Insert => KIND_INSERT,
    };
    if len <= MAX_INLINE_LEN {
        ((len as u8) << 1 | k, false)
    } else {
        (LEN_FOLLOWS << 1 | k, true)
    }
}

/// Classify an opcode byte. Returns `None` for bytes no encoder produces.
#[inline]
pub fn decode(byte: u8) -> Option<Opcode> {
    if byte == OP_END {
        return Some(Opcode::End);
    }
    let kind = if byte & KIND_INSERT != 0 {
        Kind::Insert
    } else {
        Kind::Copy
    };
    match byte >> 1 {
        0 => None,
        LEN_FOLLOWS => Some(Opcode::Op { kind, len: None }),
        n => Some(Opcode::Op {
            kind,
            len: Some(u64::from(n)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_and_explicit_lengths() {
        assert_eq!(encode(Kind::Copy, 3), (0x06, false));
        assert_eq!(encode(Kind::Insert, 3), (0x07, false));
        assert_eq!(encode(Kind::Insert, 126), (0xFD, false));
        assert_eq!(encode(Kind::Copy, 127), (0xFE, true));
        assert_eq!(encode(Kind::Insert, 1 << 40), (0xFF, true));
    }

    #[test]
    fn every_byte_classifies() {
        assert_eq!(decode(0x00), Some(Opcode::End));
        assert_eq!(decode(0x01), None);
        for byte in 2..=255u8 {
            let op = decode(byte).unwrap();
            let Opcode::Op { kind, len } = op else {
                panic!("byte {byte:#04x} decoded as end marker");
            };
            assert_eq!(kind == Kind::Insert, byte & 1 == 1);
            match len {
                Some(n) => assert_eq!(encode(kind, n), (byte, false)),
                None => assert_eq!(byte >> 1, LEN_FOLLOWS),
            }
        }
    }
}
