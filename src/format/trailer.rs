// Patch trailer: reconstructed length and CRC-32 of the new sequence.

/// Encoded size of the trailer in bytes.
pub const TRAILER_LEN: usize = 12;

/// Integrity data checked after a patch has been applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Length of the new sequence.
    pub length: u64,
    /// CRC-32 (IEEE) of the new sequence.
    pub checksum: u32,
}

impl Trailer {
    /// Compute the trailer for an in-memory sequence.
    pub fn of(data: &[u8]) -> Self {
        Self {
            length: data.len() as u64,
            checksum: crc32fast::hash(data),
        }
    }

    pub fn to_bytes(&self) -> [u8; TRAILER_LEN] {
        let mut out = [0u8; TRAILER_LEN];
        out[..8].copy_from_slice(&self.length.to_le_bytes());
        out[8..].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; TRAILER_LEN]) -> Self {
        let mut length = [0u8; 8];
        let mut checksum = [0u8; 4];
        length.copy_from_slice(&bytes[..8]);
        checksum.copy_from_slice(&bytes[8..]);
        Self {
            length: u64::from_le_bytes(length),
            checksum: u32::from_le_bytes(checksum),
        }
    }
}
