// Command-line interface for jdelta.
//
// Subcommands map onto the file layer in `io`: `diff` and `apply` stream
// through `diff_files` / `apply_files`, `inspect` lists a patch's
// instructions, `config` prints build details and the level profiles.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{self, Config, config_for_level};
use crate::format::{CopyTracker, Instruction, PatchDecoder};
use crate::io::{ApplyStats, DiffStats, Endpoint, IoError, IoOptions, apply_files, diff_files};
use crate::pipeline::{DEFAULT_CHUNK_SIZE, DEFAULT_DEPTH};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_LEVEL: u32 = 6;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (digits, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1u64 << 10),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1 << 20),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1 << 30),
        _ => (s, 1),
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_usize_size(s: &str) -> Result<usize, String> {
    let n = parse_byte_size(s)?;
    usize::try_from(n).map_err(|_| format!("size too large for this platform: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Streaming binary delta tool.
#[derive(Parser, Debug)]
#[command(
    name = "jdelta",
    version,
    about = "Compute and apply compact binary deltas",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute a patch turning OLD into NEW.
    Diff(DiffArgs),
    /// Rebuild NEW from OLD and a patch.
    Apply(ApplyArgs),
    /// List the instructions and trailer of a patch.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// Effort level (0-9); selects a matcher profile.
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Equal bytes required to accept a resync point (overrides the level).
    #[arg(long = "anchor-length", value_parser = parse_usize_size)]
    anchor_length: Option<usize>,

    /// Bytes scanned ahead in each file while resyncing (supports K/M/G suffix).
    #[arg(long = "search-window", value_parser = parse_usize_size)]
    search_window: Option<usize>,

    /// Backward reach when OLD is read from stdin (supports K/M/G suffix).
    #[arg(long = "max-old-lookback", value_parser = parse_usize_size)]
    max_old_lookback: Option<usize>,

    /// Largest literal run per Insert instruction (supports K/M/G suffix).
    #[arg(long = "max-insert", value_parser = parse_usize_size)]
    max_insert: Option<usize>,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Bytes per read-ahead / write-behind chunk (supports K/M/G suffix).
    #[arg(long = "io-chunk", value_parser = parse_usize_size, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Chunks queued per I/O thread.
    #[arg(long = "io-depth", default_value_t = DEFAULT_DEPTH)]
    depth: usize,
}

#[derive(Args, Debug)]
struct DiffArgs {
    #[command(flatten)]
    tuning: TuningArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Old file (`-` for stdin).
    old: String,

    /// New file (`-` for stdin).
    new: String,

    /// Patch file to write (stdout if omitted or `-`).
    patch: Option<String>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Backward reach when OLD is read from stdin (supports K/M/G suffix).
    #[arg(long = "max-old-lookback", value_parser = parse_usize_size)]
    max_old_lookback: Option<usize>,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Old file (`-` for stdin).
    old: String,

    /// Patch file (`-` for stdin).
    patch: String,

    /// Output file (stdout if omitted or `-`).
    output: Option<String>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Only print the summary, not every instruction.
    #[arg(long)]
    summary: bool,

    /// Patch file (`-` for stdin).
    patch: String,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Diff,
    Apply,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    config: Config,
    io: IoOptions,
    inputs: Vec<Endpoint>,
    output: Endpoint,
    summary_only: bool,
}

fn tuned_config(tuning: &TuningArgs) -> Config {
    let mut config = config_for_level(tuning.level);
    if let Some(a) = tuning.anchor_length {
        config.anchor_length = a;
    }
    if let Some(w) = tuning.search_window {
        config.search_window = w;
    }
    if let Some(l) = tuning.max_old_lookback {
        config.max_old_lookback = l;
    }
    if let Some(m) = tuning.max_insert {
        config.max_insert_len = m;
    }
    config
}

fn io_options(pipeline: &PipelineArgs, force: bool) -> IoOptions {
    IoOptions {
        force,
        chunk_size: pipeline.chunk_size,
        pipeline_depth: pipeline.depth,
    }
}

fn output_endpoint(arg: Option<&str>) -> Endpoint {
    arg.map(Endpoint::parse).unwrap_or(Endpoint::Stdio)
}

fn resolve_options(cli: Cli) -> Options {
    let quiet = cli.quiet;
    let verbose = cli.verbose.min(2);
    let force = cli.force;
    let json_output = cli.json_output;

    let base = |command| Options {
        command,
        quiet,
        verbose,
        json_output,
        config: Config::default(),
        io: IoOptions {
            force,
            ..IoOptions::default()
        },
        inputs: Vec::new(),
        output: Endpoint::Stdio,
        summary_only: false,
    };

    match cli.command {
        Cmd::Diff(args) => Options {
            config: tuned_config(&args.tuning),
            io: io_options(&args.pipeline, force),
            inputs: vec![Endpoint::parse(&args.old), Endpoint::parse(&args.new)],
            output: output_endpoint(args.patch.as_deref()),
            ..base(Command::Diff)
        },
        Cmd::Apply(args) => {
            let mut config = Config::default();
            if let Some(l) = args.max_old_lookback {
                config.max_old_lookback = l;
            }
            Options {
                config,
                io: io_options(&args.pipeline, force),
                inputs: vec![Endpoint::parse(&args.old), Endpoint::parse(&args.patch)],
                output: output_endpoint(args.output.as_deref()),
                ..base(Command::Apply)
            }
        }
        Cmd::Inspect(args) => Options {
            inputs: vec![Endpoint::parse(&args.patch)],
            summary_only: args.summary,
            ..base(Command::Inspect)
        },
        Cmd::Config => base(Command::Config),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("jdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = opts.config.validate();
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => log::warn!("could not serialize stats: {e}"),
    }
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("jdelta version {version}");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();
    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("DEFAULT_ANCHOR_LENGTH={}", config::DEFAULT_ANCHOR_LENGTH);
    eprintln!("DEFAULT_SEARCH_WINDOW={}", config::DEFAULT_SEARCH_WINDOW);
    eprintln!("DEFAULT_MAX_OLD_LOOKBACK={}", config::DEFAULT_MAX_OLD_LOOKBACK);
    eprintln!("DEFAULT_MAX_INSERT_LEN={}", config::DEFAULT_MAX_INSERT_LEN);
    eprintln!("DEFAULT_IO_CHUNK={DEFAULT_CHUNK_SIZE}");
    eprintln!("DEFAULT_IO_DEPTH={DEFAULT_DEPTH}");
    eprintln!("sizeof(usize)={ptr_size}");
    for level in [0, 2, 5, 7] {
        let c = config_for_level(level);
        eprintln!(
            "profile {:<8} levels {}: anchor={} window={}",
            c.name,
            match level {
                0 => "0-1",
                2 => "2-4",
                5 => "5-6",
                _ => "7-9",
            },
            c.anchor_length,
            c.search_window
        );
    }

    0
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn report_error(what: &str, e: &IoError) -> i32 {
    eprintln!("jdelta: {what}: {e}");
    1
}

fn cmd_diff(opts: &Options) -> i32 {
    let [old, new] = match opts.inputs.as_slice() {
        [old, new] => [old, new],
        _ => return 1,
    };
    log::info!(
        "diff {old} {new} -> {} (profile {}, anchor {}, window {})",
        opts.output,
        opts.config.name,
        opts.config.anchor_length,
        opts.config.search_window
    );

    let stats = match diff_files(old, new, &opts.output, &opts.config, &opts.io) {
        Ok(s) => s,
        Err(e) => return report_error("diff", &e),
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "jdelta: diff: new size: {}, patch size: {}, copies: {} ({} bytes), \
             inserts: {} ({} bytes)",
            stats.new_size,
            stats.patch_size,
            stats.copies,
            stats.copied_bytes,
            stats.inserts,
            stats.inserted_bytes
        );
        if let Some(sha) = stats.new_sha256 {
            eprintln!("jdelta: diff: new sha256: {}", hex(&sha));
        }
    }
    if opts.json_output {
        print_json(&diff_json(&stats, &opts.config));
    }

    0
}

fn diff_json(stats: &DiffStats, config: &Config) -> serde_json::Value {
    serde_json::json!({
        "command": "diff",
        "profile": config.name,
        "old_size": stats.old_size,
        "new_size": stats.new_size,
        "patch_size": stats.patch_size,
        "instructions": stats.instructions,
        "copies": stats.copies,
        "inserts": stats.inserts,
        "copied_bytes": stats.copied_bytes,
        "inserted_bytes": stats.inserted_bytes,
        "new_crc32": format!("{:08x}", stats.new_crc32),
        "new_sha256": stats.new_sha256.map(|d| hex(&d)),
    })
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let [old, patch] = match opts.inputs.as_slice() {
        [old, patch] => [old, patch],
        _ => return 1,
    };
    log::info!("apply {patch} to {old} -> {}", opts.output);

    let stats = match apply_files(old, patch, &opts.output, &opts.config, &opts.io) {
        Ok(s) => s,
        Err(e) => return report_error("apply", &e),
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "jdelta: apply: output size: {}, instructions: {}",
            stats.output_size, stats.instructions
        );
        if let Some(sha) = stats.output_sha256 {
            eprintln!("jdelta: apply: output sha256: {}", hex(&sha));
        }
    }
    if opts.json_output {
        print_json(&apply_json(&stats));
    }

    0
}

fn apply_json(stats: &ApplyStats) -> serde_json::Value {
    serde_json::json!({
        "command": "apply",
        "old_size": stats.old_size,
        "patch_size": stats.patch_size,
        "output_size": stats.output_size,
        "instructions": stats.instructions,
        "copies": stats.copies,
        "inserts": stats.inserts,
        "copied_bytes": stats.copied_bytes,
        "inserted_bytes": stats.inserted_bytes,
        "output_sha256": stats.output_sha256.map(|d| hex(&d)),
    })
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

/// Printable preview of a literal payload.
fn preview(bytes: &[u8]) -> String {
    const MAX: usize = 24;
    let mut s: String = bytes
        .iter()
        .take(MAX)
        .flat_map(|&b| std::ascii::escape_default(b))
        .map(char::from)
        .collect();
    if bytes.len() > MAX {
        s.push_str("...");
    }
    s
}

fn cmd_inspect(opts: &Options) -> i32 {
    let reader: Box<dyn BufRead> = match &opts.inputs[..] {
        [Endpoint::Path(path)] => match File::open(path) {
            Ok(f) => Box::new(BufReader::with_capacity(BUF_SIZE, f)),
            Err(e) => {
                eprintln!("jdelta: patch file: {}: {e}", path.display());
                return 1;
            }
        },
        _ => Box::new(BufReader::with_capacity(BUF_SIZE, io::stdin())),
    };

    match inspect(reader, &mut BufWriter::new(io::stdout().lock()), opts) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("jdelta: inspect: {e}");
            1
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum InspectError {
    #[error(transparent)]
    Decode(#[from] crate::format::DecodeError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn inspect<R: Read, W: Write>(reader: R, out: &mut W, opts: &Options) -> Result<(), InspectError> {
    let mut decoder = PatchDecoder::new(reader);
    let mut tracker = CopyTracker::new();
    let (mut copies, mut inserts, mut copied, mut inserted) = (0u64, 0u64, 0u64, 0u64);
    let mut target = 0u64;

    if !opts.summary_only {
        writeln!(out, "  Index     Target  Kind        Length  Source")?;
    }
    while let Some(inst) = decoder.next_instruction()? {
        let index = decoder.instructions_decoded() - 1;
        match &inst {
            Instruction::Copy { offset, len } => {
                copies += 1;
                copied += len;
                let source = match tracker.resolve(*offset, *len) {
                    Some(start) => format!("old@{start} ({offset:+})"),
                    None => format!("invalid ({offset:+})"),
                };
                if !opts.summary_only {
                    writeln!(out, "{index:7} {target:10}  COPY   {len:10}  {source}")?;
                }
            }
            Instruction::Insert { bytes } => {
                inserts += 1;
                inserted += bytes.len() as u64;
                if !opts.summary_only {
                    writeln!(
                        out,
                        "{index:7} {target:10}  INSERT {:10}  \"{}\"",
                        bytes.len(),
                        preview(bytes)
                    )?;
                }
            }
        }
        target += inst.len();
    }
    let trailer = decoder.require_trailer()?;

    writeln!(out, "instructions: {}", decoder.instructions_decoded())?;
    writeln!(out, "copies:       {copies} ({copied} bytes)")?;
    writeln!(out, "inserts:      {inserts} ({inserted} bytes)")?;
    writeln!(out, "new length:   {}", trailer.length)?;
    writeln!(out, "new crc32:    {:08x}", trailer.checksum)?;
    writeln!(out, "patch size:   {}", decoder.bytes_consumed())?;
    out.flush()?;

    if target != trailer.length && !opts.quiet {
        eprintln!(
            "jdelta: warning: instructions produce {target} bytes, trailer says {}",
            trailer.length
        );
    }
    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "inspect",
            "instructions": decoder.instructions_decoded(),
            "copies": copies,
            "inserts": inserts,
            "copied_bytes": copied,
            "inserted_bytes": inserted,
            "new_length": trailer.length,
            "new_crc32": format!("{:08x}", trailer.checksum),
            "patch_size": decoder.bytes_consumed(),
        }));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = opts.config.validate() {
        eprintln!("jdelta: invalid tuning: {e}");
        process::exit(1);
    }
    if opts.inputs.iter().filter(|e| e.is_stdio()).count() > 1 {
        eprintln!("jdelta: only one input can be read from stdin");
        process::exit(1);
    }

    let exit_code = match opts.command {
        Command::Diff => cmd_diff(&opts),
        Command::Apply => cmd_apply(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
