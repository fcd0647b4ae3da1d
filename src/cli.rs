// Command line for oxirdiff.
//
// Explicit subcommands in the style of rdiff:
//   signature BASIS [SIG]
//   delta SIG [NEW] [DELTA]
//   patch BASIS [DELTA] [NEW]
// plus `inspect` (dump a signature or delta) and `config`.
// A missing path or "-" means stdin/stdout. Exit status is the librsync
// result code of the failure, 0 on success.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::delta::{encoder, patcher, signer};
use crate::error::{Error, FormatError, Result};
use crate::format::command::Command as DeltaCommand;
use crate::format::delta::{DELTA_MAGIC, DeltaReader};
use crate::format::netint;
use crate::format::signature::{SIG_MAGIC_BLAKE2, SIG_MAGIC_MD4, Signature};
use crate::hash::config::{DEFAULT_BLOCK_LEN, SignatureOptions};
use crate::hash::strong::{ChecksumVariant, MAX_STRONG_LEN};
use crate::hash::table::BlockIndex;
use crate::io::{HashingWriter, OutputFile, hex};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_block_size(s: &str) -> std::result::Result<u32, String> {
    let v = parse_byte_size(s)?;
    u32::try_from(v).map_err(|_| format!("block size '{s}' does not fit in 32 bits"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// rsync-style signature, delta and patch tool (librsync formats).
#[derive(Parser, Debug)]
#[command(
    name = "oxirdiff",
    version,
    about = "rsync-style signature/delta/patch tool",
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
    /// Generate the signature of a basis file.
    Signature(SignatureArgs),
    /// Compute a delta from a signature and a new file.
    Delta(DeltaArgs),
    /// Apply a delta to a basis file.
    Patch(PatchArgs),
    /// Print the contents of a signature or delta file.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct SignatureArgs {
    /// Block size in bytes (supports K/M/G suffix).
    #[arg(long = "block-size", short = 'b', value_parser = parse_block_size, default_value_t = DEFAULT_BLOCK_LEN)]
    block_len: u32,

    /// Strong sum length in bytes (0 = full digest).
    #[arg(long = "sum-size", short = 'S', default_value_t = 0)]
    strong_len: u32,

    /// Strong checksum: md4 or blake2.
    #[arg(long = "hash", short = 'H', default_value = "blake2")]
    hash: String,

    /// Size block and strong sum lengths from the basis file size.
    #[arg(long, conflicts_with_all = ["block_len", "strong_len"])]
    recommend: bool,

    /// Basis file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Signature output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    signature: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DeltaArgs {
    /// Signature file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    signature: PathBuf,

    /// New file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    new: Option<PathBuf>,

    /// Delta output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Basis file (must be seekable, so not stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,

    /// Reconstructed output (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    new: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Signature or delta file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Signature {
        basis: Option<PathBuf>,
        output: Option<PathBuf>,
        block_len: u32,
        strong_len: u32,
        hash: String,
        recommend: bool,
    },
    Delta {
        signature: Option<PathBuf>,
        new: Option<PathBuf>,
        output: Option<PathBuf>,
    },
    Patch {
        basis: PathBuf,
        delta: Option<PathBuf>,
        output: Option<PathBuf>,
    },
    Inspect {
        input: Option<PathBuf>,
    },
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

/// "-" selects the standard stream.
fn stream_path(path: PathBuf) -> Option<PathBuf> {
    (path.as_os_str() != "-").then_some(path)
}

fn resolve_options(cli: Cli) -> Options {
    let command = match cli.command {
        Cmd::Signature(args) => Command::Signature {
            basis: stream_path(args.basis),
            output: args.signature.and_then(stream_path),
            block_len: args.block_len,
            strong_len: args.strong_len,
            hash: args.hash,
            recommend: args.recommend,
        },
        Cmd::Delta(args) => Command::Delta {
            signature: stream_path(args.signature),
            new: args.new.and_then(stream_path),
            output: args.delta.and_then(stream_path),
        },
        Cmd::Patch(args) => Command::Patch {
            basis: args.basis,
            delta: args.delta.and_then(stream_path),
            output: args.new.and_then(stream_path),
        },
        Cmd::Inspect(args) => Command::Inspect {
            input: stream_path(args.input),
        },
        Cmd::Config => Command::Config,
    };
    Options {
        command,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxirdiff".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        if let Command::Signature { hash, .. } = &opts.command {
            let _ = hash.parse::<ChecksumVariant>();
        }
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

fn open_input(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::with_capacity(BUF_SIZE, File::open(path)?)),
        None => Box::new(BufReader::with_capacity(BUF_SIZE, io::stdin().lock())),
    })
}

/// Output destination: a scoped file or stdout.
enum Sink {
    File(OutputFile),
    Stdout(BufWriter<io::StdoutLock<'static>>),
}

impl Sink {
    fn open(path: Option<&Path>, force: bool) -> io::Result<Self> {
        Ok(match path {
            Some(path) => Self::File(OutputFile::create(path, force)?),
            None => Self::Stdout(BufWriter::with_capacity(BUF_SIZE, io::stdout().lock())),
        })
    }

    fn commit(self) -> io::Result<()> {
        match self {
            Self::File(f) => f.commit().map(drop),
            Self::Stdout(mut w) => w.flush(),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.write(buf),
            Self::Stdout(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(f) => f.flush(),
            Self::Stdout(w) => w.flush(),
        }
    }
}

fn report(opts: &Options, text: impl std::fmt::Display, json: serde_json::Value) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!("oxirdiff: {text}");
    }
    if opts.json_output {
        eprintln!("{json:#}");
    }
}

fn sha256_json(digest: Option<[u8; 32]>) -> serde_json::Value {
    digest.map_or(serde_json::Value::Null, |d| hex(&d).into())
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxirdiff version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_BLOCK_LEN={DEFAULT_BLOCK_LEN}");
    eprintln!("DEFAULT_HASH={}", ChecksumVariant::default());
    eprintln!("MAX_STRONG_LEN={MAX_STRONG_LEN}");
    for variant in ChecksumVariant::ALL {
        eprintln!(
            "HASH_{}_LEN={}",
            variant.name().to_ascii_uppercase(),
            variant.digest_len()
        );
    }
    eprintln!("SIG_MAGIC_MD4={SIG_MAGIC_MD4:#010x}");
    eprintln!("SIG_MAGIC_BLAKE2={SIG_MAGIC_BLAKE2:#010x}");
    eprintln!("DELTA_MAGIC={DELTA_MAGIC:#010x}");
    eprintln!("sizeof(usize)={ptr_size}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Signature command
// ---------------------------------------------------------------------------

fn signature_options(
    basis: Option<&Path>,
    block_len: u32,
    strong_len: u32,
    hash: &str,
    recommend: bool,
) -> Result<SignatureOptions> {
    let variant: ChecksumVariant = hash.parse()?;
    if !recommend {
        return Ok(SignatureOptions::new(block_len, strong_len, variant));
    }
    let Some(path) = basis else {
        return Err(Error::Config(
            "--recommend needs a basis file, not stdin".into(),
        ));
    };
    let len = std::fs::metadata(path)?.len();
    let sig_opts = SignatureOptions::recommended(len, variant);
    log::info!(
        "recommended for {len} bytes: block_len={} strong_len={}",
        sig_opts.block_len,
        sig_opts.strong_len
    );
    Ok(sig_opts)
}

fn cmd_signature(opts: &Options) -> Result<()> {
    let Command::Signature {
        basis,
        output,
        block_len,
        strong_len,
        hash,
        recommend,
    } = &opts.command
    else {
        return Ok(());
    };
    let sig_opts = signature_options(basis.as_deref(), *block_len, *strong_len, hash, *recommend)?;
    sig_opts.validate()?;

    let mut input = open_input(basis.as_deref())?;
    let (sig, stats) = signer::build(&mut input, &sig_opts, None)?;

    let mut sink = Sink::open(output.as_deref(), opts.force)?;
    let mut w = HashingWriter::new(&mut sink);
    sig.write_to(&mut w)?;
    let digest = w.finish();
    sink.commit()?;

    report(
        opts,
        stats,
        serde_json::json!({
            "command": "signature",
            "hash": sig.variant().name(),
            "block_len": sig.block_len(),
            "strong_len": sig.strong_len(),
            "blocks": stats.blocks,
            "in_bytes": stats.in_bytes,
            "out_bytes": stats.out_bytes,
            "sha256": sha256_json(digest),
        }),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Delta command
// ---------------------------------------------------------------------------

fn cmd_delta(opts: &Options) -> Result<()> {
    let Command::Delta {
        signature,
        new,
        output,
    } = &opts.command
    else {
        return Ok(());
    };
    if signature.is_none() && new.is_none() {
        return Err(Error::Config(
            "signature and new file cannot both be stdin".into(),
        ));
    }

    let sig = {
        let mut r = open_input(signature.as_deref())?;
        Signature::read_from(&mut r)?
    };
    let index = BlockIndex::new(&sig)?;
    let mut input = open_input(new.as_deref())?;

    let mut sink = Sink::open(output.as_deref(), opts.force)?;
    let (w, stats) = encoder::encode(&index, &mut input, HashingWriter::new(&mut sink), None)?;
    let digest = w.finish();
    sink.commit()?;

    report(
        opts,
        stats,
        serde_json::json!({
            "command": "delta",
            "literal_cmds": stats.literal_cmds,
            "literal_bytes": stats.literal_bytes,
            "copy_cmds": stats.copy_cmds,
            "copy_bytes": stats.copy_bytes,
            "false_matches": stats.false_matches,
            "in_bytes": stats.in_bytes,
            "out_bytes": stats.out_bytes,
            "sha256": sha256_json(digest),
        }),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options) -> Result<()> {
    let Command::Patch {
        basis,
        delta,
        output,
    } = &opts.command
    else {
        return Ok(());
    };
    if basis.as_os_str() == "-" {
        return Err(Error::Config("basis must be a seekable file, not stdin".into()));
    }

    let basis = BufReader::with_capacity(BUF_SIZE, File::open(basis)?);
    let input = open_input(delta.as_deref())?;

    let mut sink = Sink::open(output.as_deref(), opts.force)?;
    let mut w = HashingWriter::new(&mut sink);
    let stats = patcher::apply(basis, input, &mut w, None)?;
    let digest = w.finish();
    sink.commit()?;

    report(
        opts,
        stats,
        serde_json::json!({
            "command": "patch",
            "literal_cmds": stats.literal_cmds,
            "literal_bytes": stats.literal_bytes,
            "copy_cmds": stats.copy_cmds,
            "copy_bytes": stats.copy_bytes,
            "in_bytes": stats.in_bytes,
            "out_bytes": stats.out_bytes,
            "sha256": sha256_json(digest),
        }),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> Result<()> {
    let Command::Inspect { input } = &opts.command else {
        return Ok(());
    };
    let mut reader = open_input(input.as_deref())?;
    let mut magic = [0u8; 4];
    netint::read_exact_or(&mut reader, &mut magic, "file magic")?;
    let mut r = (&magic[..]).chain(reader);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match u32::from_be_bytes(magic) {
        SIG_MAGIC_MD4 | SIG_MAGIC_BLAKE2 => {
            let sig = Signature::read_from(&mut r)?;
            print_signature(&mut out, &sig, opts.json_output)?;
        }
        DELTA_MAGIC => print_delta(&mut out, DeltaReader::new(r)?, opts.json_output)?,
        other => return Err(FormatError::BadMagic(other).into()),
    }
    out.flush()?;
    Ok(())
}

fn print_signature<W: Write>(out: &mut W, sig: &Signature, json: bool) -> Result<()> {
    if json {
        let blocks: Vec<_> = sig
            .blocks()
            .map(|b| {
                serde_json::json!({
                    "offset": sig.basis_offset(b.index),
                    "weak": format!("{:08x}", b.weak_sum),
                    "strong": hex(b.strong_sum),
                })
            })
            .collect();
        let doc = serde_json::json!({
            "kind": "signature",
            "hash": sig.variant().name(),
            "block_len": sig.block_len(),
            "strong_len": sig.strong_len(),
            "blocks": blocks,
        });
        writeln!(out, "{doc:#}")?;
        return Ok(());
    }

    writeln!(out, "Signature magic:     {:#010x} ({})", sig.magic(), sig.variant())?;
    writeln!(out, "Block length:        {}", sig.block_len())?;
    writeln!(out, "Strong sum length:   {}", sig.strong_len())?;
    writeln!(out, "Blocks:              {}", sig.len())?;
    writeln!(out, "   Block       Offset  Weak      Strong")?;
    for b in sig.blocks() {
        writeln!(
            out,
            "  {:6} {:12}  {:08x}  {}",
            b.index,
            sig.basis_offset(b.index),
            b.weak_sum,
            hex(b.strong_sum)
        )?;
    }
    Ok(())
}

fn print_delta<W: Write, R: Read>(out: &mut W, delta: DeltaReader<R>, json: bool) -> Result<()> {
    let mut offset = 0u64;
    let mut commands = Vec::new();
    if !json {
        writeln!(out, "Delta magic:         {DELTA_MAGIC:#010x}")?;
        writeln!(out, "  Offset  Command    Length  Basis@")?;
    }
    for cmd in delta {
        let cmd = cmd?;
        match cmd {
            DeltaCommand::Literal { len } => {
                if json {
                    commands.push(serde_json::json!({"op": "literal", "at": offset, "len": len}));
                } else {
                    writeln!(out, "  {offset:06}  LITERAL {len:9}")?;
                }
                offset = offset.saturating_add(len);
            }
            DeltaCommand::Copy {
                offset: basis_offset,
                len,
            } => {
                if json {
                    commands.push(serde_json::json!({
                        "op": "copy", "at": offset, "len": len, "basis_offset": basis_offset,
                    }));
                } else {
                    writeln!(out, "  {offset:06}  COPY    {len:9}  {basis_offset}")?;
                }
                offset = offset.saturating_add(len);
            }
            DeltaCommand::End => break,
        }
    }
    if json {
        let doc = serde_json::json!({
            "kind": "delta",
            "output_len": offset,
            "commands": commands,
        });
        writeln!(out, "{doc:#}")?;
    } else {
        writeln!(out, "Output length:       {offset}")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let level = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result = match opts.command {
        Command::Signature { .. } => cmd_signature(&opts),
        Command::Delta { .. } => cmd_delta(&opts),
        Command::Patch { .. } => cmd_patch(&opts),
        Command::Inspect { .. } => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    let exit_code = match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("oxirdiff: {e}");
            e.code()
        }
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
