// Match spans and copy-offset bookkeeping.

use std::fmt;

/// One contiguous piece of the new sequence.
///
/// Spans produced for one diff are contiguous over `new`: resolving them in
/// order against `old` (Copy) or their payload (Insert) reproduces `new`.
#[derive(Clone, PartialEq, Eq)]
pub enum Span {
    /// Reuse `len` bytes of old. `offset` is relative to the end of the
    /// previous Copy's source range (the first Copy is relative to 0).
    Copy { offset: i64, len: u64 },
    /// Literal bytes not taken from old.
    Insert { bytes: Vec<u8> },
}

/// Decoder output has the same shape as matcher output.
pub type Instruction = Span;

impl Span {
    /// Number of bytes of `new` this span produces.
    pub fn len(&self) -> u64 {
        match self {
            Span::Copy { len, .. } => *len,
            Span::Insert { bytes } => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Literal payloads can be megabytes; keep debug output readable.
impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Copy { offset, len } => write!(f, "Copy {{ offset: {offset}, len: {len} }}"),
            Span::Insert { bytes } if bytes.len() <= 32 => {
                write!(f, "Insert {{ bytes: {:?} }}", String::from_utf8_lossy(bytes))
            }
            Span::Insert { bytes } => write!(f, "Insert {{ len: {} }}", bytes.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Copy offset resolution
// ---------------------------------------------------------------------------

/// Tracks the end of the previous Copy's source range.
///
/// The encoder side turns absolute source offsets into deltas, the decoder
/// and applier turn deltas back into absolute offsets; both use the same
/// accumulation rule.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyTracker {
    end: u64,
}

impl CopyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// End of the previous Copy's source range.
    pub fn last_end(&self) -> u64 {
        self.end
    }

    /// Delta for a copy of `len` bytes starting at absolute `start`.
    pub fn delta_for(&mut self, start: u64, len: u64) -> i64 {
        let delta = start.wrapping_sub(self.end) as i64;
        self.end = start.wrapping_add(len);
        delta
    }

    /// Absolute start of a copy given its delta, or `None` if the result
    /// would fall outside `0..=u64::MAX`.
    pub fn resolve(&mut self, offset: i64, len: u64) -> Option<u64> {
        let start = self.end.checked_add_signed(offset)?;
        self.end = start.checked_add(len)?;
        Some(start)
    }
}
