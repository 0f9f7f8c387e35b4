// Sliding buffer shared by the reader-backed cursors.
//
// Holds a contiguous run of the sequence starting at absolute offset
// `base`. Bytes older than `position - retention` are dropped lazily, once
// they make up at least half of the buffer, so each byte is moved at most
// a constant number of times.

use std::io::{self, Read};

use super::{CursorError, DEFAULT_READ_SIZE};

pub(crate) struct SlidingWindow {
    buf: Vec<u8>,
    /// Absolute offset of `buf[0]`.
    base: u64,
    pos: u64,
    eof: bool,
    lookahead: usize,
    retention: usize,
}

impl SlidingWindow {
    pub(crate) fn new(start: u64, lookahead: usize, retention: usize) -> Self {
        Self {
            buf: Vec::new(),
            base: start,
            pos: start,
            eof: false,
            lookahead: lookahead.max(1),
            retention,
        }
    }

    pub(crate) fn position(&self) -> u64 {
        self.pos
    }

    pub(crate) fn lookahead(&self) -> usize {
        self.lookahead
    }

    pub(crate) fn retention(&self) -> usize {
        self.retention
    }

    /// Absolute offset one past the last buffered byte.
    fn end(&self) -> u64 {
        self.base + self.buf.len() as u64
    }

    fn window_start(&self) -> u64 {
        self.pos.saturating_sub(self.retention as u64).max(self.base)
    }

    fn window_end(&self) -> u64 {
        self.pos.saturating_add(self.lookahead as u64)
    }

    fn out_of_window(&self, offset: u64) -> CursorError {
        CursorError::OutOfWindow {
            offset,
            window_start: self.window_start(),
            window_end: self.window_end(),
        }
    }

    fn compact(&mut self) {
        let keep_from = self.window_start().min(self.end());
        let drop = (keep_from - self.base) as usize;
        if drop > 0 && drop >= self.buf.len() / 2 {
            self.buf.drain(..drop);
            self.base = keep_from;
        }
    }

    /// Read until `target` is buffered or the source is exhausted.
    fn fill_to<R: Read>(&mut self, reader: &mut R, target: u64) -> io::Result<()> {
        while !self.eof && self.end() < target {
            self.compact();
            let want = ((target - self.end()) as usize).max(DEFAULT_READ_SIZE);
            let filled = self.buf.len();
            self.buf.resize(filled + want, 0);
            match reader.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    self.buf.truncate(filled);
                    self.eof = true;
                }
                Ok(n) => self.buf.truncate(filled + n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.buf.truncate(filled),
                Err(e) => {
                    self.buf.truncate(filled);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn slice_at<R: Read>(
        &mut self,
        reader: &mut R,
        offset: u64,
        len: usize,
    ) -> Result<&[u8], CursorError> {
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| self.out_of_window(offset))?;
        if offset < self.window_start() || end > self.window_end() {
            return Err(self.out_of_window(offset));
        }
        self.fill_to(reader, end)?;
        let buffered = self.end();
        let lo = (offset.min(buffered) - self.base) as usize;
        let hi = (end.min(buffered) - self.base) as usize;
        Ok(&self.buf[lo..hi])
    }

    pub(crate) fn advance<R: Read>(&mut self, reader: &mut R, n: u64) -> Result<(), CursorError> {
        let target = self
            .pos
            .checked_add(n)
            .ok_or_else(|| self.out_of_window(u64::MAX))?;
        loop {
            self.pos = target.min(self.end()).max(self.pos);
            if self.pos == target {
                return Ok(());
            }
            if self.eof {
                return Err(self.out_of_window(target));
            }
            let step = self.end().saturating_add(DEFAULT_READ_SIZE as u64).min(target);
            self.fill_to(reader, step)?;
        }
    }

    /// Move within the buffered range. Returns `false` when `offset` is not
    /// buffered and the caller has to reposition the underlying reader.
    pub(crate) fn reposition(&mut self, offset: u64) -> bool {
        if offset >= self.base && offset <= self.end() {
            self.pos = offset;
            true
        } else {
            false
        }
    }

    /// Drop all buffered data and restart at `offset`.
    pub(crate) fn reset(&mut self, offset: u64) {
        self.buf.clear();
        self.base = offset;
        self.pos = offset;
        self.eof = false;
    }
}
