// Delta engine: ties the matcher and applier to the patch format.
//
// Provides the high-level entry points:
//   - `diff` / `diff_to`   match old against new and encode the spans
//   - `apply` / `apply_to` decode a patch and rebuild new from old
//
// The `_to` variants work on cursors and streams, so callers choose how
// old/new are held (memory, file, pipe) and where the output goes.

use std::io::{self, Read, Write};

use crate::config::{Config, ConfigError};
use crate::cursor::{ByteCursor, CursorError, SliceCursor};
use crate::format::{PatchDecoder, PatchEncoder, TRAILER_LEN, Trailer};
use crate::matcher::{MatchStats, Matcher};

pub use crate::applier::{ApplyError, ApplySummary};
use crate::applier::Applier;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// What one diff produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffSummary {
    pub stats: MatchStats,
    /// Length and CRC-32 of `new`, as written to the patch.
    pub trailer: Trailer,
    /// Instruction records written (excluding the end marker).
    pub instructions: u64,
    /// Total patch size in bytes.
    pub patch_len: u64,
}

/// Compute a patch turning `old` into `new`.
pub fn diff(old: &[u8], new: &[u8], config: &Config) -> Result<Vec<u8>, DiffError> {
    let (patch, _) = diff_to(
        SliceCursor::new(old),
        SliceCursor::new(new),
        Vec::new(),
        config,
    )?;
    Ok(patch)
}

/// Stream a patch turning `old` into `new` into `out`.
///
/// Both cursors need a lookahead of at least [`Config::lookahead`] bytes;
/// `old` is only ever read forward.
pub fn diff_to<O, N, W>(
    old: O,
    new: N,
    out: W,
    config: &Config,
) -> Result<(W, DiffSummary), DiffError>
where
    O: ByteCursor,
    N: ByteCursor,
    W: Write,
{
    let mut matcher = Matcher::new(old, new, config)?;
    let mut encoder = PatchEncoder::new(out);
    for span in matcher.by_ref() {
        encoder.write_span(&span?)?;
    }

    let trailer = matcher.trailer();
    let instructions = encoder.instructions();
    // End marker plus trailer follow the records.
    let patch_len = encoder.bytes_written() + 1 + TRAILER_LEN as u64;
    let out = encoder.finish(trailer)?;
    let summary = DiffSummary {
        stats: *matcher.stats(),
        trailer,
        instructions,
        patch_len,
    };
    log::debug!(
        "diff ({}): {} bytes of new in {} instructions",
        config.name,
        trailer.length,
        instructions
    );
    Ok((out, summary))
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Rebuild `new` from `old` and a patch.
pub fn apply(old: &[u8], patch: &[u8]) -> Result<Vec<u8>, ApplyError> {
    let (new, _) = apply_to(SliceCursor::new(old), patch, Vec::new())?;
    Ok(new)
}

/// Stream the result of applying `patch` to `old` into `out`.
///
/// Output is written as instructions are decoded; the trailer is only
/// checked at the end, so callers writing to a file should discard it on
/// error.
pub fn apply_to<O, R, W>(old: O, patch: R, out: W) -> Result<(W, ApplySummary), ApplyError>
where
    O: ByteCursor,
    R: Read,
    W: Write,
{
    let mut decoder = PatchDecoder::new(patch);
    let mut applier = Applier::new(old, out);
    for inst in decoder.by_ref() {
        applier.apply(&inst?)?;
    }
    let trailer = decoder.require_trailer()?;
    applier.finish(trailer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, config_for_level};
    use crate::cursor::StreamCursor;
    use crate::format::{Malformed, Span, decode_all};

    fn roundtrip(old: &[u8], new: &[u8]) -> Vec<u8> {
        let patch = diff(old, new, &Config::default()).expect("diff failed");
        let rebuilt = apply(old, &patch).expect("apply failed");
        assert_eq!(
            rebuilt,
            new,
            "roundtrip mismatch (old={}, new={}, patch={})",
            old.len(),
            new.len(),
            patch.len()
        );
        patch
    }

    #[test]
    fn roundtrip_identical() {
        let data = b"The quick brown fox jumps over the lazy dog.";
        let patch = roundtrip(data, data);
        let decoded = decode_all(&patch).unwrap();
        assert_eq!(
            decoded.instructions,
            vec![Span::Copy {
                offset: 0,
                len: data.len() as u64
            }]
        );
    }

    #[test]
    fn roundtrip_small_edit() {
        roundtrip(
            b"Hello, world! This is a test of the delta engine.",
            b"Hello, earth! This is a test of the delta engine.",
        );
    }

    #[test]
    fn roundtrip_no_old() {
        let patch = roundtrip(b"", b"HELLO");
        let decoded = decode_all(&patch).unwrap();
        assert_eq!(
            decoded.instructions,
            vec![Span::Insert {
                bytes: b"HELLO".to_vec()
            }]
        );
        assert_eq!(decoded.trailer.checksum, crc32fast::hash(b"HELLO"));
    }

    #[test]
    fn roundtrip_empty_new() {
        let patch = roundtrip(b"some old data", b"");
        assert_eq!(patch.len(), 1 + TRAILER_LEN);
    }

    #[test]
    fn roundtrip_reordered_blocks() {
        roundtrip(
            b"AAAA BBBB CCCC DDDD EEEE FFFF GGGG HHHH",
            b"AAAA CCCC DDDD EEEE xxxx GGGG HHHH IIII",
        );
    }

    #[test]
    fn roundtrip_binary_data() {
        let old: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let mut new = old.clone();
        new[100] = 0xFF;
        new[200] = 0x00;
        new[1000] = 0x42;
        roundtrip(&old, &new);
    }

    #[test]
    fn roundtrip_all_levels() {
        let old = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789abcdefghijklmnopqrstuvwxyz";
        let new = b"ABCDEFGHIJKLMNOP--CHANGED--UVWXYZ0123456789abcdefghijklmnopqrstuvwxyz!!!";
        for level in 0..=9 {
            let config = config_for_level(level);
            let patch = diff(old, new, &config).expect("diff failed");
            assert_eq!(apply(old, &patch).unwrap(), new, "level {level} roundtrip failed");
        }
    }

    #[test]
    fn patch_is_small_for_similar_data() {
        let old: Vec<u8> = (0..=255).cycle().take(8192).collect();
        let mut new = old.clone();
        new[4096] ^= 0xFF;
        let patch = diff(&old, &new, &Config::default()).unwrap();
        assert!(
            patch.len() < 64,
            "patch ({}) should be tiny for a one-byte change",
            patch.len()
        );
    }

    #[test]
    fn summary_matches_output() {
        let old = b"ABCDEFGHIJ";
        let new = b"ABCXYZGHIJ";
        let (patch, summary) = diff_to(
            SliceCursor::new(old),
            SliceCursor::new(new),
            Vec::new(),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(summary.patch_len, patch.len() as u64);
        assert_eq!(summary.instructions, 3);
        assert_eq!(summary.trailer, Trailer::of(new));

        let (out, applied) = apply_to(SliceCursor::new(old), &patch[..], Vec::new()).unwrap();
        assert_eq!(out, new);
        assert_eq!(applied.instructions, 3);
        assert_eq!(applied.copied_bytes, 7);
        assert_eq!(applied.inserted_bytes, 3);
        assert_eq!(applied.trailer, summary.trailer);
    }

    #[test]
    fn streamed_old_applies_forward() {
        let old: Vec<u8> = (0..100_000u32).map(|i| (i * 31 % 256) as u8).collect();
        let mut new = old.clone();
        new.drain(20_000..21_000);
        new[50_000] ^= 1;
        let patch = diff(&old, &new, &Config::default()).unwrap();
        let cursor = StreamCursor::new(&old[..], 64 * 1024, config::DEFAULT_MAX_OLD_LOOKBACK);
        let (out, _) = apply_to(cursor, &patch[..], Vec::new()).unwrap();
        assert_eq!(out, new);
    }

    #[test]
    fn corrupt_patches_are_rejected() {
        let old = b"ABCDEFGHIJ";
        let new = b"ABCXYZGHIJ";
        let patch = diff(old, new, &Config::default()).unwrap();

        let err = apply(old, &patch[..patch.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Decode(ref e) if e.malformed() == Some(Malformed::TruncatedTrailer(11))
        ));

        let mut flipped = patch.clone();
        flipped[3] ^= 0x20; // one literal byte
        assert!(matches!(
            apply(old, &flipped).unwrap_err(),
            ApplyError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn invalid_config_is_reported() {
        let config = Config {
            search_window: 0,
            ..Config::default()
        };
        assert!(matches!(
            diff(b"a", b"b", &config),
            Err(DiffError::Config(ConfigError::ZeroSearchWindow))
        ));
    }
}
