// Applier: rebuilds `new` from `old` and a stream of instructions.
//
// Copy sources are resolved with the same offset accumulation the encoder
// used. Seekable old cursors jump straight to the source; forward-only
// streams skip ahead, or serve a backward reference from their retention
// window when it is still buffered. Output bytes are counted and
// checksummed on the way out and compared with the trailer at the end.

use std::io::{self, Write};

use crate::cursor::{ByteCursor, CursorError};
use crate::format::{CopyTracker, DecodeError, Instruction, Trailer};

/// Largest chunk moved from old to the output per read.
const COPY_CHUNK: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The old bytes a Copy needs cannot be read (evicted from a stream's
    /// window, past the end of old, or an I/O failure).
    #[error("instruction {index}: {source}")]
    Copy { index: u64, source: CursorError },
    /// A Copy offset resolves outside the 64-bit address range.
    #[error("instruction {index}: copy source resolves outside 0..2^64")]
    InvalidCopy { index: u64 },
    #[error("length mismatch: trailer says {expected} bytes, produced {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
    #[error("checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// What one apply produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub instructions: u64,
    pub copies: u64,
    pub inserts: u64,
    pub copied_bytes: u64,
    pub inserted_bytes: u64,
    /// Verified trailer of the output.
    pub trailer: Trailer,
}

// ---------------------------------------------------------------------------
// Applier
// ---------------------------------------------------------------------------

/// Executes instructions against an old cursor, writing to `out`.
pub struct Applier<O: ByteCursor, W: Write> {
    old: O,
    out: W,
    tracker: CopyTracker,
    hasher: crc32fast::Hasher,
    written: u64,
    summary: ApplySummary,
}

impl<O: ByteCursor, W: Write> Applier<O, W> {
    pub fn new(old: O, out: W) -> Self {
        Self {
            old,
            out,
            tracker: CopyTracker::new(),
            hasher: crc32fast::Hasher::new(),
            written: 0,
            summary: ApplySummary::default(),
        }
    }

    /// Bytes written to the output so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Execute the next instruction.
    pub fn apply(&mut self, inst: &Instruction) -> Result<(), ApplyError> {
        let index = self.summary.instructions;
        match inst {
            Instruction::Copy { offset, len } => {
                let start = self
                    .tracker
                    .resolve(*offset, *len)
                    .ok_or(ApplyError::InvalidCopy { index })?;
                self.copy(index, start, *len)?;
                self.summary.copies += 1;
                self.summary.copied_bytes += len;
            }
            Instruction::Insert { bytes } => {
                self.emit(bytes)?;
                self.summary.inserts += 1;
                self.summary.inserted_bytes += bytes.len() as u64;
            }
        }
        self.summary.instructions += 1;
        Ok(())
    }

    /// Check the output against `trailer`, flush, and return the sink.
    pub fn finish(mut self, trailer: Trailer) -> Result<(W, ApplySummary), ApplyError> {
        self.out.flush()?;
        if self.written != trailer.length {
            return Err(ApplyError::LengthMismatch {
                expected: trailer.length,
                actual: self.written,
            });
        }
        let checksum = self.hasher.finalize();
        if checksum != trailer.checksum {
            return Err(ApplyError::ChecksumMismatch {
                expected: trailer.checksum,
                actual: checksum,
            });
        }
        self.summary.trailer = trailer;
        log::debug!(
            "applied {} instructions: {} copies ({} bytes), {} inserts ({} bytes)",
            self.summary.instructions,
            self.summary.copies,
            self.summary.copied_bytes,
            self.summary.inserts,
            self.summary.inserted_bytes
        );
        Ok((self.out, self.summary))
    }

    fn copy(&mut self, index: u64, start: u64, len: u64) -> Result<(), ApplyError> {
        let wrap = |source: CursorError| ApplyError::Copy { index, source };

        let pos = self.old.position();
        if start != pos {
            if self.old.is_seekable() {
                self.old.seek_absolute(start).map_err(wrap)?;
            } else if start > pos {
                self.old.advance(start - pos).map_err(wrap)?;
            }
            // Backward on a stream: served from the retention window below.
        }

        let chunk = COPY_CHUNK.min(self.old.lookahead()) as u64;
        let mut at = start;
        let mut remaining = len;
        while remaining > 0 {
            let pos = self.old.position();
            let mut want = chunk.min(remaining);
            if at < pos {
                want = want.min(pos - at);
            }
            let bytes = self.old.slice_at(at, want as usize).map_err(wrap)?;
            if bytes.is_empty() {
                return Err(wrap(CursorError::OutOfWindow {
                    offset: at,
                    window_start: start,
                    window_end: at,
                }));
            }
            self.out.write_all(bytes)?;
            self.hasher.update(bytes);
            let got = bytes.len() as u64;
            if at >= pos {
                self.old.advance(got).map_err(wrap)?;
            }
            self.written += got;
            at += got;
            remaining -= got;
        }
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), ApplyError> {
        self.out.write_all(bytes)?;
        self.hasher.update(bytes);
        self.written += bytes.len() as u64;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
