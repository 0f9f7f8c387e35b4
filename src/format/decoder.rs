// Patch decoder: streaming record parser.
//
// Reads one record at a time from any `Read`, resolving Copy offsets as it
// goes so that a Copy reaching before offset 0 is reported here rather than
// at apply time. After the end marker the 12-byte trailer is read and the
// input must be exhausted.

use std::io::{self, Read};

use super::opcode::{self, Kind, Opcode};
use super::span::{CopyTracker, Instruction};
use super::trailer::{TRAILER_LEN, Trailer};
use super::varint::{self, VarIntError};

/// Largest Insert literal a decoder accepts by default (1 GiB).
pub const MAX_LITERAL_LEN: u64 = 1 << 30;

// Literal buffers grow from this size as bytes actually arrive.
const LITERAL_CHUNK: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What was wrong with a malformed patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("truncated varint")]
    TruncatedVarint,
    #[error("varint does not fit in 64 bits")]
    VarintOverflow,
    #[error("zero-length instruction")]
    ZeroLength,
    #[error("literal truncated: expected {expected} bytes, got {actual}")]
    TruncatedLiteral { expected: u64, actual: u64 },
    #[error("literal of {len} bytes exceeds the {limit}-byte limit")]
    LiteralTooLong { len: u64, limit: u64 },
    #[error("copy source resolves outside 0..2^64")]
    SourceOutOfRange,
    #[error("missing end-of-instructions marker")]
    MissingTerminator,
    #[error("trailer truncated: {0} of 12 bytes")]
    TruncatedTrailer(usize),
    #[error("unexpected data after trailer")]
    TrailingData,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The patch is not well formed. `index` is the zero-based record number
    /// and `offset` the byte offset of that record's opcode.
    #[error("malformed patch at instruction {index} (byte {offset}): {kind}")]
    Malformed {
        index: u64,
        offset: u64,
        kind: Malformed,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// The malformation kind, if this is a format error.
    pub fn malformed(&self) -> Option<Malformed> {
        match self {
            Self::Malformed { kind, .. } => Some(*kind),
            Self::Io(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Byte counting
// ---------------------------------------------------------------------------

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Stream decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Records,
    Done,
    Failed,
}

/// Decodes patch records from a `Read` source.
///
/// Iterating yields each [`Instruction`] in order; once the iterator is
/// exhausted without error, [`trailer`](Self::trailer) holds the
/// integrity data. The first error ends iteration.
pub struct PatchDecoder<R: Read> {
    reader: CountingReader<R>,
    tracker: CopyTracker,
    index: u64,
    record_start: u64,
    trailer: Option<Trailer>,
    state: State,
    literal_limit: u64,
}

impl<R: Read> PatchDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_literal_limit(reader, MAX_LITERAL_LEN)
    }

    /// Like [`new`](Self::new), rejecting Insert records longer than
    /// `limit` before any of their bytes are read.
    pub fn with_literal_limit(reader: R, limit: u64) -> Self {
        Self {
            reader: CountingReader {
                inner: reader,
                count: 0,
            },
            tracker: CopyTracker::new(),
            index: 0,
            record_start: 0,
            trailer: None,
            state: State::Records,
            literal_limit: limit,
        }
    }

    /// Decode the next record. Returns `Ok(None)` after the trailer has been
    /// read and validated.
    pub fn next_instruction(&mut self) -> Result<Option<Instruction>, DecodeError> {
        if self.state != State::Records {
            return Ok(None);
        }
        match self.read_record() {
            Ok(Some(inst)) => {
                self.index += 1;
                Ok(Some(inst))
            }
            Ok(None) => {
                self.state = State::Done;
                Ok(None)
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// The trailer, available once all records have been decoded.
    pub fn trailer(&self) -> Option<Trailer> {
        self.trailer
    }

    /// The trailer, or `MissingTerminator` if decoding has not reached it.
    pub fn require_trailer(&self) -> Result<Trailer, DecodeError> {
        self.trailer.ok_or_else(|| self.malformed(Malformed::MissingTerminator))
    }

    /// Number of records decoded so far.
    pub fn instructions_decoded(&self) -> u64 {
        self.index
    }

    /// Number of patch bytes consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.reader.count
    }

    /// End of the previous Copy's source range.
    pub fn copy_end(&self) -> u64 {
        self.tracker.last_end()
    }

    pub fn into_inner(self) -> R {
        self.reader.inner
    }

    fn malformed(&self, kind: Malformed) -> DecodeError {
        DecodeError::Malformed {
            index: self.index,
            offset: self.record_start,
            kind,
        }
    }

    fn read_record(&mut self) -> Result<Option<Instruction>, DecodeError> {
        self.record_start = self.reader.count;
        let byte = match self.read_byte()? {
            Some(b) => b,
            None => return Err(self.malformed(Malformed::MissingTerminator)),
        };
        let (kind, inline) = match opcode::decode(byte) {
            Some(Opcode::End) => {
                self.read_trailer()?;
                return Ok(None);
            }
            Some(Opcode::Op { kind, len }) => (kind, len),
            None => return Err(self.malformed(Malformed::UnknownOpcode(byte))),
        };

        match kind {
            Kind::Copy => {
                let offset = varint::zigzag_decode(self.read_varint()?);
                let len = self.read_len(inline)?;
                if self.tracker.resolve(offset, len).is_none() {
                    return Err(self.malformed(Malformed::SourceOutOfRange));
                }
                Ok(Some(Instruction::Copy { offset, len }))
            }
            Kind::Insert => {
                let len = self.read_len(inline)?;
                if len > self.literal_limit {
                    return Err(self.malformed(Malformed::LiteralTooLong {
                        len,
                        limit: self.literal_limit,
                    }));
                }
                let mut bytes = Vec::with_capacity(len.min(LITERAL_CHUNK) as usize);
                (&mut self.reader).take(len).read_to_end(&mut bytes)?;
                if (bytes.len() as u64) < len {
                    return Err(self.malformed(Malformed::TruncatedLiteral {
                        expected: len,
                        actual: bytes.len() as u64,
                    }));
                }
                Ok(Some(Instruction::Insert { bytes }))
            }
        }
    }

    fn read_len(&mut self, inline: Option<u64>) -> Result<u64, DecodeError> {
        match inline {
            Some(n) => Ok(n),
            None => match self.read_varint()? {
                0 => Err(self.malformed(Malformed::ZeroLength)),
                n => Ok(n),
            },
        }
    }

    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        varint::stream_read_u64(&mut self.reader).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return self.malformed(Malformed::TruncatedVarint);
            }
            match e.get_ref().and_then(|inner| inner.downcast_ref::<VarIntError>()) {
                Some(VarIntError::Overflow) => self.malformed(Malformed::VarintOverflow),
                None => DecodeError::Io(e),
            }
        })
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_trailer(&mut self) -> Result<(), DecodeError> {
        let mut buf = [0u8; TRAILER_LEN];
        let mut filled = 0;
        while filled < TRAILER_LEN {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => return Err(self.malformed(Malformed::TruncatedTrailer(filled))),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if self.read_byte()?.is_some() {
            return Err(self.malformed(Malformed::TrailingData));
        }
        self.trailer = Some(Trailer::from_bytes(&buf));
        Ok(())
    }
}

impl<R: Read> Iterator for PatchDecoder<R> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_instruction().transpose()
    }
}

// ---------------------------------------------------------------------------
// In-memory convenience
// ---------------------------------------------------------------------------

/// A fully decoded patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPatch {
    pub instructions: Vec<Instruction>,
    pub trailer: Trailer,
}

/// Decode a complete patch held in memory.
pub fn decode_all(patch: &[u8]) -> Result<DecodedPatch, DecodeError> {
    let mut decoder = PatchDecoder::new(patch);
    let instructions = decoder.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok(DecodedPatch {
        instructions,
        trailer: decoder.require_trailer()?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
