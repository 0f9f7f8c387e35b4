// Byte cursors: bounded-window access to old/new byte sequences.
//
// The matcher and applier only ever talk to a `ByteCursor`, so the same
// logic runs over in-memory buffers, random-access files and forward-only
// pipes. Implementations differ only in how far ahead (lookahead) and how
// far behind (retention) of the current position they can address.
//
// - `SliceCursor`   borrowed in-memory data, seekable, unbounded windows
// - `StreamCursor`  forward-only `Read`, sliding buffer
// - `SeekCursor`    `Read + Seek`, sliding buffer plus absolute seeks

mod slice;
mod stream;
mod window;

pub use slice::SliceCursor;
pub use stream::{SeekCursor, StreamCursor};

/// Default read granularity for buffered cursors (64 KiB).
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// The requested offset lies outside the retained/lookahead window, or
    /// past the end of a finite sequence.
    #[error("offset {offset} is outside the addressable window [{window_start}, {window_end})")]
    OutOfWindow {
        offset: u64,
        window_start: u64,
        window_end: u64,
    },
    /// Absolute seek requested on a forward-only source.
    #[error("cannot seek from {from} to {to} on a forward-only source")]
    UnsupportedSeek { from: u64, to: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Cursor trait
// ---------------------------------------------------------------------------

/// Bounded-lookahead reader over a byte sequence.
///
/// Addressable offsets are `[position - retention, position + lookahead)`.
/// Reads that run into the end of a finite sequence return short slices;
/// reads outside the window fail with [`CursorError::OutOfWindow`].
pub trait ByteCursor {
    /// Current absolute position.
    fn position(&self) -> u64;

    /// Whether [`seek_absolute`](Self::seek_absolute) is supported.
    fn is_seekable(&self) -> bool;

    /// Number of bytes addressable at and after `position`.
    fn lookahead(&self) -> usize;

    /// Number of bytes kept addressable before `position`.
    fn retention(&self) -> usize;

    /// Bytes `[offset, offset + len)`, truncated at the end of the sequence.
    fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8], CursorError>;

    /// Move `position` forward by `n` bytes.
    fn advance(&mut self, n: u64) -> Result<(), CursorError>;

    /// Move `position` to `offset`. Forward-only cursors fail with
    /// [`CursorError::UnsupportedSeek`].
    fn seek_absolute(&mut self, offset: u64) -> Result<(), CursorError>;

    /// Bytes `[position + k, position + k + len)`, truncated at the end.
    fn ahead(&mut self, k: usize, len: usize) -> Result<&[u8], CursorError> {
        let offset = self.position().saturating_add(k as u64);
        self.slice_at(offset, len)
    }

    /// The byte at `position + k`.
    fn peek(&mut self, k: usize) -> Result<u8, CursorError> {
        let offset = self.position().saturating_add(k as u64);
        let byte = self.slice_at(offset, 1)?.first().copied();
        byte.ok_or(CursorError::OutOfWindow {
            offset,
            window_start: self.position(),
            window_end: offset,
        })
    }
}

impl<C: ByteCursor + ?Sized> ByteCursor for Box<C> {
    fn position(&self) -> u64 {
        (**self).position()
    }
    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
    fn lookahead(&self) -> usize {
        (**self).lookahead()
    }
    fn retention(&self) -> usize {
        (**self).retention()
    }
    fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8], CursorError> {
        (**self).slice_at(offset, len)
    }
    fn advance(&mut self, n: u64) -> Result<(), CursorError> {
        (**self).advance(n)
    }
    fn seek_absolute(&mut self, offset: u64) -> Result<(), CursorError> {
        (**self).seek_absolute(offset)
    }
}

impl<C: ByteCursor + ?Sized> ByteCursor for &mut C {
    fn position(&self) -> u64 {
        (**self).position()
    }
    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
    fn lookahead(&self) -> usize {
        (**self).lookahead()
    }
    fn retention(&self) -> usize {
        (**self).retention()
    }
    fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8], CursorError> {
        (**self).slice_at(offset, len)
    }
    fn advance(&mut self, n: u64) -> Result<(), CursorError> {
        (**self).advance(n)
    }
    fn seek_absolute(&mut self, offset: u64) -> Result<(), CursorError> {
        (**self).seek_absolute(offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
