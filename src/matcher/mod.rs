// Matcher: turns an (old, new) cursor pair into a lazy stream of spans.
//
// The walk alternates between two modes:
//
//   Extend  equal bytes at the old/new positions grow the open Copy span
//   Search  after a mismatch, look for a resynchronization point within
//           `search_window` bytes of both positions (see `resync`); on a
//           hit the skipped new bytes become literal data and matching
//           resumes, otherwise one byte of new becomes literal data and
//           the search is retried one byte further
//
// Both cursors only ever move forward, so Copy sources are non-decreasing
// and a forward-only old stream never needs to serve a backward reference.
// Memory is bounded by the cursor windows plus one literal run of at most
// `max_insert_len` bytes.

pub mod resync;

use std::collections::VecDeque;

use crate::config::{Config, ConfigError};
use crate::cursor::{ByteCursor, CursorError};
use crate::format::{CopyTracker, Span, Trailer};

use resync::{AnchorIndex, Resync};

/// Largest chunk compared per step while extending a Copy.
const EXTEND_CHUNK: usize = 64 * 1024;

/// Counters collected during one diff.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchStats {
    pub copies: u64,
    pub inserts: u64,
    pub copied_bytes: u64,
    pub inserted_bytes: u64,
    /// Resynchronization searches run (one per literal byte while unaligned).
    pub searches: u64,
    /// Searches that found a realignment point.
    pub resyncs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Extend,
    Search,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct OpenCopy {
    start: u64,
    len: u64,
}

/// Rows of the search grid already scanned for the current old position.
#[derive(Debug, Clone, Copy)]
struct Scanned {
    origin: u64,
    /// Absolute new offsets below this failed against every old candidate.
    until: u64,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Lazy span producer over an old and a new cursor.
///
/// Yields spans in order; once iteration ends without error
/// [`trailer`](Self::trailer) holds the length and CRC-32 of `new`. Both
/// cursors need a lookahead of at least [`Config::lookahead`] bytes.
pub struct Matcher<O: ByteCursor, N: ByteCursor> {
    old: O,
    new: N,
    config: Config,
    mode: Mode,
    open_copy: Option<OpenCopy>,
    literal: Vec<u8>,
    tracker: CopyTracker,
    pending: VecDeque<Span>,
    index: AnchorIndex,
    scanned: Option<Scanned>,
    hasher: crc32fast::Hasher,
    new_len: u64,
    stats: MatchStats,
}

impl<O: ByteCursor, N: ByteCursor> Matcher<O, N> {
    pub fn new(old: O, new: N, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            old,
            new,
            config: *config,
            mode: Mode::Extend,
            open_copy: None,
            literal: Vec::new(),
            tracker: CopyTracker::new(),
            pending: VecDeque::new(),
            index: AnchorIndex::new(),
            scanned: None,
            hasher: crc32fast::Hasher::new(),
            new_len: 0,
            stats: MatchStats::default(),
        })
    }

    /// Length and checksum of the part of `new` consumed so far.
    pub fn trailer(&self) -> Trailer {
        Trailer {
            length: self.new_len,
            checksum: self.hasher.clone().finalize(),
        }
    }

    /// Whether matching has ended, successfully or not.
    pub fn is_done(&self) -> bool {
        self.mode == Mode::Done
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    fn step(&mut self) -> Result<(), CursorError> {
        match self.mode {
            Mode::Extend => self.extend(),
            Mode::Search => self.search(),
            Mode::Done => Ok(()),
        }
    }

    fn extend(&mut self) -> Result<(), CursorError> {
        let chunk = EXTEND_CHUNK
            .min(self.old.lookahead())
            .min(self.new.lookahead());
        let old = self.old.ahead(0, chunk)?;
        let new = self.new.ahead(0, chunk)?;
        if new.is_empty() {
            return self.finish();
        }
        let k = old.iter().zip(new).take_while(|(a, b)| a == b).count();
        if k == 0 {
            self.close_copy();
            self.mode = Mode::Search;
            return Ok(());
        }
        self.hasher.update(&new[..k]);

        if self.open_copy.is_none() {
            self.flush_literal();
            self.open_copy = Some(OpenCopy {
                start: self.old.position(),
                len: 0,
            });
        }
        if let Some(copy) = self.open_copy.as_mut() {
            copy.len += k as u64;
        }
        self.old.advance(k as u64)?;
        self.new.advance(k as u64)?;
        self.new_len += k as u64;
        Ok(())
    }

    fn search(&mut self) -> Result<(), CursorError> {
        let window = self.config.lookahead();
        let o = self.old.position();
        let n = self.new.position();
        let ow = self.old.ahead(0, window)?;
        let nw = self.new.ahead(0, window)?;
        if nw.is_empty() {
            return self.finish();
        }
        if ow.is_empty() {
            // Old is exhausted: everything left in new is literal.
            let rest = nw.to_vec();
            return self.push_literal(&rest);
        }

        if !self.index.is_built_for(o) {
            self.index.rebuild(o, ow, self.config.search_window);
        }
        let first_row = match self.scanned {
            Some(s) if s.origin == o => s.until.saturating_sub(n) as usize,
            _ => 0,
        };
        let (result, rows_end) = resync::search(
            &self.index,
            ow,
            nw,
            self.config.anchor_length,
            self.config.search_window,
            first_row,
        );
        self.stats.searches += 1;
        log::trace!("resync at old={o} new={n} rows {first_row}..{rows_end}: {result:?}");

        match result {
            Resync::Found { d_old, d_new } => {
                let skipped = nw[..d_new].to_vec();
                self.stats.resyncs += 1;
                self.scanned = None;
                self.push_literal(&skipped)?;
                self.old.advance(d_old as u64)?;
                self.mode = Mode::Extend;
            }
            Resync::NotFound => {
                let byte = nw[0];
                self.scanned = Some(Scanned {
                    origin: o,
                    until: n + rows_end as u64,
                });
                self.push_literal(&[byte])?;
            }
        }
        Ok(())
    }

    /// Append bytes at the new position to the literal run and step past
    /// them, flushing the run whenever it reaches `max_insert_len`.
    fn push_literal(&mut self, mut bytes: &[u8]) -> Result<(), CursorError> {
        let total = bytes.len() as u64;
        self.hasher.update(bytes);
        while !bytes.is_empty() {
            let room = self.config.max_insert_len - self.literal.len();
            let take = room.min(bytes.len());
            self.literal.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.literal.len() >= self.config.max_insert_len {
                self.flush_literal();
            }
        }
        self.new.advance(total)?;
        self.new_len += total;
        Ok(())
    }

    fn flush_literal(&mut self) {
        if self.literal.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut self.literal);
        self.stats.inserts += 1;
        self.stats.inserted_bytes += bytes.len() as u64;
        log::trace!("insert {} bytes", bytes.len());
        self.pending.push_back(Span::Insert { bytes });
    }

    fn close_copy(&mut self) {
        if let Some(copy) = self.open_copy.take() {
            let offset = self.tracker.delta_for(copy.start, copy.len);
            self.stats.copies += 1;
            self.stats.copied_bytes += copy.len;
            log::trace!("copy {} bytes from {} (offset {offset})", copy.len, copy.start);
            self.pending.push_back(Span::Copy {
                offset,
                len: copy.len,
            });
        }
    }

    fn finish(&mut self) -> Result<(), CursorError> {
        self.close_copy();
        self.flush_literal();
        self.mode = Mode::Done;
        let s = &self.stats;
        log::debug!(
            "matched {} bytes: {} copies ({} bytes), {} inserts ({} bytes), {} searches, {} resyncs",
            self.new_len,
            s.copies,
            s.copied_bytes,
            s.inserts,
            s.inserted_bytes,
            s.searches,
            s.resyncs
        );
        Ok(())
    }
}

impl<O: ByteCursor, N: ByteCursor> Iterator for Matcher<O, N> {
    type Item = Result<Span, CursorError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(span) = self.pending.pop_front() {
                return Some(Ok(span));
            }
            if self.mode == Mode::Done {
                return None;
            }
            if let Err(e) = self.step() {
                self.mode = Mode::Done;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{SliceCursor, StreamCursor};

    fn spans_with(old: &[u8], new: &[u8], config: &Config) -> (Vec<Span>, Trailer) {
        let mut m = Matcher::new(SliceCursor::new(old), SliceCursor::new(new), config).unwrap();
        let spans = m.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        (spans, m.trailer())
    }

    fn spans(old: &[u8], new: &[u8]) -> Vec<Span> {
        spans_with(old, new, &Config::default()).0
    }

    /// Rebuild `new` from spans the way the applier does.
    fn replay(old: &[u8], spans: &[Span]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut tracker = CopyTracker::new();
        for span in spans {
            match span {
                Span::Copy { offset, len } => {
                    let start = tracker.resolve(*offset, *len).unwrap() as usize;
                    out.extend_from_slice(&old[start..start + *len as usize]);
                }
                Span::Insert { bytes } => out.extend_from_slice(bytes),
            }
        }
        out
    }

    fn insert(bytes: &[u8]) -> Span {
        Span::Insert {
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn replaced_middle() {
        let s = spans(b"ABCDEFGHIJ", b"ABCXYZGHIJ");
        assert_eq!(
            s,
            vec![
                Span::Copy { offset: 0, len: 3 },
                insert(b"XYZ"),
                Span::Copy { offset: 3, len: 4 },
            ]
        );
    }

    #[test]
    fn empty_old_yields_inserts() {
        let (s, trailer) = spans_with(b"", b"HELLO", &Config::default());
        assert_eq!(s, vec![insert(b"HELLO")]);
        assert_eq!(trailer, Trailer::of(b"HELLO"));
    }

    #[test]
    fn identical_inputs_yield_one_copy() {
        let data = b"AAAAAAAAAA";
        assert_eq!(spans(data, data), vec![Span::Copy { offset: 0, len: 10 }]);
    }

    #[test]
    fn empty_new_yields_nothing() {
        let (s, trailer) = spans_with(b"something", b"", &Config::default());
        assert!(s.is_empty());
        assert_eq!(trailer.length, 0);
    }

    #[test]
    fn deleted_block_skips_old() {
        let old = b"0123456789abcdefghijKLMNOPQRSTUVWXYZ";
        let new = b"0123456789KLMNOPQRSTUVWXYZ";
        let s = spans(old, new);
        assert_eq!(
            s,
            vec![
                Span::Copy { offset: 0, len: 10 },
                Span::Copy {
                    offset: 10,
                    len: 16
                },
            ]
        );
    }

    #[test]
    fn unrelated_data_becomes_literal() {
        let old = vec![b'a'; 300];
        let new = vec![b'b'; 300];
        let config = Config {
            search_window: 32,
            ..Config::default()
        };
        let (s, trailer) = spans_with(&old, &new, &config);
        assert_eq!(s, vec![Span::Insert { bytes: new.clone() }]);
        assert_eq!(trailer, Trailer::of(&new));
    }

    #[test]
    fn literal_runs_are_capped() {
        let new: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let config = Config {
            max_insert_len: 256,
            ..Config::default()
        };
        let (s, _) = spans_with(b"", &new, &config);
        let lens: Vec<u64> = s.iter().map(Span::len).collect();
        assert_eq!(lens, vec![256, 256, 256, 232]);
        assert_eq!(replay(b"", &s), new);
    }

    #[test]
    fn stats_are_counted() {
        let mut m = Matcher::new(
            SliceCursor::new(b"ABCDEFGHIJ"),
            SliceCursor::new(b"ABCXYZGHIJ"),
            &Config::default(),
        )
        .unwrap();
        for span in m.by_ref() {
            span.unwrap();
        }
        let st = *m.stats();
        assert_eq!((st.copies, st.copied_bytes), (2, 7));
        assert_eq!((st.inserts, st.inserted_bytes), (1, 3));
        assert_eq!(st.resyncs, 1);
    }

    #[test]
    fn streamed_cursors_match_in_memory() {
        let old: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        let mut new = old.clone();
        new.splice(10_000..10_010, b"patched!!!".iter().copied());
        new.drain(30_000..30_500);
        new.extend_from_slice(b"tail");

        let config = Config::default();
        let expected = spans_with(&old, &new, &config);

        let la = config.lookahead();
        let mut m = Matcher::new(
            StreamCursor::new(&old[..], la, 0),
            StreamCursor::new(&new[..], la, 0),
            &config,
        )
        .unwrap();
        let streamed = m.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!((streamed, m.trailer()), expected);
        assert_eq!(replay(&old, &expected.0), new);
    }

    #[test]
    fn copies_never_move_backwards() {
        let old = b"the quick brown fox jumps over the lazy dog";
        let new = b"the lazy dog jumps over the quick brown fox";
        let config = Config {
            anchor_length: 4,
            ..Config::default()
        };
        let (s, _) = spans_with(old, new, &config);
        assert!(s.iter().all(|span| match span {
            Span::Copy { offset, .. } => *offset >= 0,
            Span::Insert { .. } => true,
        }));
        assert_eq!(replay(old, &s), new);
    }

    #[test]
    fn short_window_reports_error() {
        let old = vec![0u8; 100];
        let new = vec![1u8; 100];
        let mut m = Matcher::new(
            StreamCursor::new(&old[..], 4, 0),
            StreamCursor::new(&new[..], 4, 0),
            &Config::default(),
        )
        .unwrap();
        assert!(matches!(
            m.next(),
            Some(Err(CursorError::OutOfWindow { .. }))
        ));
        assert!(m.next().is_none());
        assert!(m.is_done());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = Config {
            anchor_length: 0,
            ..Config::default()
        };
        assert!(Matcher::new(SliceCursor::new(b""), SliceCursor::new(b""), &config).is_err());
    }
}
