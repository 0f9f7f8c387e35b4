// In-memory cursor over a borrowed byte slice.

use super::{ByteCursor, CursorError};

/// Seekable cursor over borrowed data. Every offset inside the slice is
/// addressable regardless of the current position.
#[derive(Debug, Clone)]
pub struct SliceCursor<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> SliceCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total length of the underlying data.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn out_of_window(&self, offset: u64) -> CursorError {
        CursorError::OutOfWindow {
            offset,
            window_start: 0,
            window_end: self.len(),
        }
    }
}

impl ByteCursor for SliceCursor<'_> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn lookahead(&self) -> usize {
        usize::MAX
    }

    fn retention(&self) -> usize {
        usize::MAX
    }

    fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8], CursorError> {
        let data_len = self.data.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data_len);
        let end = start.saturating_add(len).min(data_len);
        Ok(&self.data[start..end])
    }

    fn advance(&mut self, n: u64) -> Result<(), CursorError> {
        let target = self.pos.saturating_add(n);
        if target > self.len() {
            return Err(self.out_of_window(target));
        }
        self.pos = target;
        Ok(())
    }

    fn seek_absolute(&mut self, offset: u64) -> Result<(), CursorError> {
        if offset > self.len() {
            return Err(self.out_of_window(offset));
        }
        self.pos = offset;
        Ok(())
    }
}
