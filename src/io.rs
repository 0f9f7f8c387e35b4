// File-level I/O helpers for diffing and applying.
//
// Provides `diff_files()` and `apply_files()`, which wire files or stdio
// into the streaming engine:
//
//   - old from a file is a `SeekCursor`; old from stdin is a `StreamCursor`
//     retaining `max_old_lookback` bytes for backward references
//   - new and patch inputs are streamed through `ReadAhead`
//   - outputs go through `WriteBehind` into an `AtomicOutput`, which is only
//     made visible once the whole operation succeeded
//
// With the `file-io` feature SHA-256 digests of `new` (diff) and of the
// rebuilt output (apply) are computed incrementally.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::config::Config;
use crate::cursor::{ByteCursor, DEFAULT_READ_SIZE, SeekCursor, StreamCursor};
use crate::engine::{self, ApplyError, DiffError};
use crate::pipeline::{DEFAULT_CHUNK_SIZE, DEFAULT_DEPTH, ReadAhead, WriteBehind};

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// An input or output location: a filesystem path or stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Path(PathBuf),
    Stdio,
}

impl Endpoint {
    /// `-` denotes stdin/stdout, anything else a path.
    pub fn parse(s: &str) -> Self {
        if s == "-" {
            Self::Stdio
        } else {
            Self::Path(PathBuf::from(s))
        }
    }

    pub fn is_stdio(&self) -> bool {
        matches!(self, Self::Stdio)
    }
}

impl From<&Path> for Endpoint {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Stdio => f.write_str("-"),
        }
    }
}

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Knobs for the file layer.
#[derive(Debug, Clone)]
pub struct IoOptions {
    /// Replace existing output files.
    pub force: bool,
    /// Bytes moved per read-ahead / write-behind message.
    pub chunk_size: usize,
    /// Messages buffered per pipeline channel.
    pub pipeline_depth: usize,
}

impl Default for IoOptions {
    fn default() -> Self {
        Self {
            force: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pipeline_depth: DEFAULT_DEPTH,
        }
    }
}

/// Statistics returned by `diff_files()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Old file size in bytes (`None` when read from stdin).
    pub old_size: Option<u64>,
    pub new_size: u64,
    pub patch_size: u64,
    pub instructions: u64,
    pub copies: u64,
    pub inserts: u64,
    pub copied_bytes: u64,
    pub inserted_bytes: u64,
    /// CRC-32 written to the patch trailer.
    pub new_crc32: u32,
    /// SHA-256 of new (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `apply_files()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Old file size in bytes (`None` when read from stdin).
    pub old_size: Option<u64>,
    pub patch_size: u64,
    pub output_size: u64,
    pub instructions: u64,
    pub copies: u64,
    pub inserts: u64,
    pub copied_bytes: u64,
    pub inserted_bytes: u64,
    /// SHA-256 of the rebuilt output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),
    #[error("apply failed: {0}")]
    Apply(#[from] ApplyError),
    #[error("output file exists, use --force to overwrite: {}", .0.display())]
    OutputExists(PathBuf),
    #[error("only one input can be read from stdin")]
    StdinTwice,
}

// ---------------------------------------------------------------------------
// Atomic output
// ---------------------------------------------------------------------------

enum Destination {
    /// Temp file next to the destination, renamed into place on commit.
    File {
        temp: tempfile::NamedTempFile,
        path: PathBuf,
        force: bool,
    },
    /// Anonymous spool file copied to stdout on commit.
    Stdout { spool: File },
}

/// Output that only becomes visible once [`commit`](Self::commit) is called.
///
/// Dropping an uncommitted output discards everything written to it.
pub struct AtomicOutput {
    dest: Destination,
}

impl AtomicOutput {
    /// Prepare an output for `endpoint`. Existing files are refused unless
    /// `force` is set.
    pub fn create(endpoint: &Endpoint, force: bool) -> Result<Self, IoError> {
        let dest = match endpoint {
            Endpoint::Path(path) => {
                if !force && path.exists() {
                    return Err(IoError::OutputExists(path.clone()));
                }
                let dir = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p,
                    _ => Path::new("."),
                };
                let temp = tempfile::Builder::new()
                    .prefix(".jdelta-")
                    .suffix(".tmp")
                    .tempfile_in(dir)?;
                Destination::File {
                    temp,
                    path: path.clone(),
                    force,
                }
            }
            Endpoint::Stdio => Destination::Stdout {
                spool: tempfile::tempfile()?,
            },
        };
        Ok(Self { dest })
    }

    /// A handle writing into the pending output.
    pub fn writer(&self) -> io::Result<File> {
        match &self.dest {
            Destination::File { temp, .. } => temp.as_file().try_clone(),
            Destination::Stdout { spool } => spool.try_clone(),
        }
    }

    /// Make the output visible: rename the temp file over the destination,
    /// or copy the spool to stdout.
    pub fn commit(self) -> Result<(), IoError> {
        match self.dest {
            Destination::File { temp, path, force } => {
                temp.as_file().sync_all()?;
                let persisted = if force {
                    temp.persist(&path)
                } else {
                    temp.persist_noclobber(&path)
                };
                match persisted {
                    Ok(_) => Ok(()),
                    Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                        Err(IoError::OutputExists(path))
                    }
                    Err(e) => Err(IoError::Io(e.error)),
                }
            }
            Destination::Stdout { mut spool } => {
                spool.seek(SeekFrom::Start(0))?;
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                io::copy(&mut spool, &mut lock)?;
                lock.flush()?;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// diff_files
// ---------------------------------------------------------------------------

/// Diff `old` against `new`, writing the patch to `patch`.
///
/// Nothing is written to `patch` unless the whole diff succeeds.
pub fn diff_files(
    old: &Endpoint,
    new: &Endpoint,
    patch: &Endpoint,
    config: &Config,
    opts: &IoOptions,
) -> Result<DiffStats, IoError> {
    if old.is_stdio() && new.is_stdio() {
        return Err(IoError::StdinTwice);
    }
    config.validate().map_err(DiffError::from)?;

    let output = AtomicOutput::create(patch, opts.force)?;
    let (mut old_cursor, old_size) = open_old(old, config, config.lookahead(), opts)?;
    let (new_reader, _) = open_input(new, opts)?;
    let mut new_cursor = StreamCursor::new(TapReader::new(new_reader), config.lookahead(), 0);
    let sink = WriteBehind::spawn(output.writer()?, opts.chunk_size, opts.pipeline_depth)?;

    let (sink, summary) = engine::diff_to(&mut old_cursor, &mut new_cursor, sink, config)?;
    sink.finish()?;
    let new_sha256 = new_cursor.into_inner().digest();
    output.commit()?;

    log::info!(
        "{} -> {}: {} bytes of new in a {}-byte patch",
        old,
        new,
        summary.trailer.length,
        summary.patch_len
    );
    let stats = summary.stats;
    Ok(DiffStats {
        old_size,
        new_size: summary.trailer.length,
        patch_size: summary.patch_len,
        instructions: summary.instructions,
        copies: stats.copies,
        inserts: stats.inserts,
        copied_bytes: stats.copied_bytes,
        inserted_bytes: stats.inserted_bytes,
        new_crc32: summary.trailer.checksum,
        new_sha256,
    })
}

// ---------------------------------------------------------------------------
// apply_files
// ---------------------------------------------------------------------------

/// Apply `patch` to `old`, writing the result to `output`.
///
/// The output is only made visible after the trailer has been verified.
pub fn apply_files(
    old: &Endpoint,
    patch: &Endpoint,
    output: &Endpoint,
    config: &Config,
    opts: &IoOptions,
) -> Result<ApplyStats, IoError> {
    if old.is_stdio() && patch.is_stdio() {
        return Err(IoError::StdinTwice);
    }

    let out = AtomicOutput::create(output, opts.force)?;
    let lookahead = DEFAULT_READ_SIZE.max(config.lookahead());
    let (mut old_cursor, old_size) = open_old(old, config, lookahead, opts)?;
    let (patch_reader, _) = open_input(patch, opts)?;
    let mut patch_reader = TapReader::new(patch_reader);
    let sink = WriteBehind::spawn(out.writer()?, opts.chunk_size, opts.pipeline_depth)?;

    let (sink, summary) = engine::apply_to(&mut old_cursor, &mut patch_reader, TapWriter::new(sink))?;
    let (sink, output_sha256) = sink.into_parts();
    sink.finish()?;
    out.commit()?;

    log::info!(
        "{} + {} -> {}: {} bytes",
        old,
        patch,
        output,
        summary.trailer.length
    );
    Ok(ApplyStats {
        old_size,
        patch_size: patch_reader.count,
        output_size: summary.trailer.length,
        instructions: summary.instructions,
        copies: summary.copies,
        inserts: summary.inserts,
        copied_bytes: summary.copied_bytes,
        inserted_bytes: summary.inserted_bytes,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

fn open_input(endpoint: &Endpoint, opts: &IoOptions) -> io::Result<(ReadAhead, Option<u64>)> {
    match endpoint {
        Endpoint::Path(path) => {
            let file = File::open(path)?;
            let size = file.metadata()?.len();
            let reader = ReadAhead::spawn(file, opts.chunk_size, opts.pipeline_depth)?;
            Ok((reader, Some(size)))
        }
        Endpoint::Stdio => {
            let reader = ReadAhead::spawn(io::stdin(), opts.chunk_size, opts.pipeline_depth)?;
            Ok((reader, None))
        }
    }
}

/// Open old as a cursor: seekable for files, a retaining stream for stdin.
fn open_old(
    endpoint: &Endpoint,
    config: &Config,
    lookahead: usize,
    opts: &IoOptions,
) -> io::Result<(Box<dyn ByteCursor>, Option<u64>)> {
    match endpoint {
        Endpoint::Path(path) => {
            let cursor = SeekCursor::new(File::open(path)?, lookahead, config.max_old_lookback)?;
            let size = cursor.len();
            Ok((Box::new(cursor), Some(size)))
        }
        Endpoint::Stdio => {
            let (reader, _) = open_input(endpoint, opts)?;
            let cursor = StreamCursor::new(reader, lookahead, config.max_old_lookback);
            Ok((Box::new(cursor), None))
        }
    }
}

// ---------------------------------------------------------------------------
// Counting / hashing adapters
// ---------------------------------------------------------------------------

/// SHA-256 accumulator; a no-op without the `file-io` feature.
#[derive(Default)]
struct Sha256Tap {
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl Sha256Tap {
    #[cfg(feature = "file-io")]
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    #[cfg(not(feature = "file-io"))]
    fn update(&mut self, _bytes: &[u8]) {}

    #[cfg(feature = "file-io")]
    fn finish(self) -> Option<[u8; 32]> {
        Some(self.hasher.finalize().into())
    }

    #[cfg(not(feature = "file-io"))]
    fn finish(self) -> Option<[u8; 32]> {
        None
    }
}

struct TapReader<R: Read> {
    inner: R,
    count: u64,
    sha: Sha256Tap,
}

impl<R: Read> TapReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            count: 0,
            sha: Sha256Tap::default(),
        }
    }

    fn digest(self) -> Option<[u8; 32]> {
        self.sha.finish()
    }
}

impl<R: Read> Read for TapReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        self.sha.update(&buf[..n]);
        Ok(n)
    }
}

struct TapWriter<W: Write> {
    inner: W,
    sha: Sha256Tap,
}

impl<W: Write> TapWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            sha: Sha256Tap::default(),
        }
    }

    fn into_parts(self) -> (W, Option<[u8; 32]>) {
        (self.inner, self.sha.finish())
    }
}

impl<W: Write> Write for TapWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.sha.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
