// Reader-backed cursors.
//
// `StreamCursor` wraps any `Read` and can only move forward; `SeekCursor`
// additionally repositions the reader on `seek_absolute`. Both keep a
// `SlidingWindow` of `retention` bytes behind and `lookahead` bytes ahead
// of the current position.

use std::io::{self, Read, Seek, SeekFrom};

use super::window::SlidingWindow;
use super::{ByteCursor, CursorError};

// ---------------------------------------------------------------------------
// Forward-only stream
// ---------------------------------------------------------------------------

/// Forward-only cursor over a `Read` (pipes, stdin, sockets).
pub struct StreamCursor<R: Read> {
    reader: R,
    window: SlidingWindow,
}

impl<R: Read> StreamCursor<R> {
    /// Create a cursor addressing `lookahead` bytes ahead and `retention`
    /// bytes behind the current position.
    pub fn new(reader: R, lookahead: usize, retention: usize) -> Self {
        Self {
            reader,
            window: SlidingWindow::new(0, lookahead, retention),
        }
    }

    /// Return the wrapped reader. Buffered but unconsumed bytes are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ByteCursor for StreamCursor<R> {
    fn position(&self) -> u64 {
        self.window.position()
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn lookahead(&self) -> usize {
        self.window.lookahead()
    }

    fn retention(&self) -> usize {
        self.window.retention()
    }

    fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8], CursorError> {
        self.window.slice_at(&mut self.reader, offset, len)
    }

    fn advance(&mut self, n: u64) -> Result<(), CursorError> {
        self.window.advance(&mut self.reader, n)
    }

    fn seek_absolute(&mut self, offset: u64) -> Result<(), CursorError> {
        Err(CursorError::UnsupportedSeek {
            from: self.window.position(),
            to: offset,
        })
    }
}

// ---------------------------------------------------------------------------
// Random-access file
// ---------------------------------------------------------------------------

/// Seekable cursor over a `Read + Seek` (regular files).
///
/// Seeks inside the buffered range only move the position; seeks outside it
/// drop the buffer and reposition the reader.
pub struct SeekCursor<R: Read + Seek> {
    reader: R,
    window: SlidingWindow,
    len: u64,
}

impl<R: Read + Seek> SeekCursor<R> {
    /// Create a cursor positioned at offset 0. The total length is measured
    /// up front so seeks past the end can be rejected.
    pub fn new(mut reader: R, lookahead: usize, retention: usize) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            window: SlidingWindow::new(0, lookahead, retention),
            len,
        })
    }

    /// Total length of the underlying data.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> ByteCursor for SeekCursor<R> {
    fn position(&self) -> u64 {
        self.window.position()
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn lookahead(&self) -> usize {
        self.window.lookahead()
    }

    fn retention(&self) -> usize {
        self.window.retention()
    }

    fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8], CursorError> {
        self.window.slice_at(&mut self.reader, offset, len)
    }

    fn advance(&mut self, n: u64) -> Result<(), CursorError> {
        let target = self.window.position().saturating_add(n);
        if target > self.len {
            return Err(CursorError::OutOfWindow {
                offset: target,
                window_start: 0,
                window_end: self.len,
            });
        }
        if n > self.window.lookahead() as u64 {
            // Cheaper to jump than to read and discard.
            return self.seek_absolute(target);
        }
        self.window.advance(&mut self.reader, n)
    }

    fn seek_absolute(&mut self, offset: u64) -> Result<(), CursorError> {
        if offset > self.len {
            return Err(CursorError::OutOfWindow {
                offset,
                window_start: 0,
                window_end: self.len,
            });
        }
        if !self.window.reposition(offset) {
            self.reader.seek(SeekFrom::Start(offset))?;
            self.window.reset(offset);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
