//! CLI surface and session parameters
//!
//! `CliArgs` is the clap-derived shape of argv; `SessionParams` is the
//! immutable, validated form the supervisor and each worker actually carry
//! around. The `server`/`tmpserver` subcommands are not user-facing verbs —
//! they're how the driver re-invokes this same binary as the remote agent.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::error::{Result, SyncError};

/// Top-level CLI, mirroring the external interface's flag table
#[derive(Parser, Debug, Clone)]
#[command(name = "blocksync", version, about = "Synchronize block devices by transferring only the blocks that differ")]
pub struct CliArgs {
    /// Source block device or file, read-only
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Destination host, as `[user@]host`; `localhost` runs the agent locally
    #[arg(value_name = "DEST_HOST")]
    pub dest_host: Option<String>,

    /// Destination block device or file path on DEST_HOST; defaults to SOURCE's path
    #[arg(value_name = "DEST_PATH")]
    pub dest_path: Option<String>,

    #[command(flatten)]
    pub session: SessionFlags,

    #[command(subcommand)]
    pub command: Option<Mode>,
}

/// Flags shared between top-level sync invocation and the agent subcommands
#[derive(Parser, Debug, Clone)]
pub struct SessionFlags {
    /// Number of parallel driver/agent pairs
    #[arg(short = 'w', long, default_value_t = 1)]
    pub workers: usize,

    /// Milliseconds to sleep between spawning each worker
    #[arg(short = 'l', long, default_value_t = 250)]
    pub splay: u64,

    /// Block size in bytes
    #[arg(short = 'b', long, default_value_t = 1_048_576, value_parser = parse_size)]
    pub blocksize: u64,

    /// Primary hash algorithm
    #[arg(short = '1', long, default_value_t = HashAlgorithm::Sha512)]
    pub hash: HashAlgorithm,

    /// Optional secondary hash algorithm, from a different family than the primary
    #[arg(short = '2', long)]
    pub additionalhash: Option<HashAlgorithm>,

    /// Cache-advisor bitmask: bit0 local (driver) side, bit1 remote (agent) side
    #[arg(short = 'd', long, default_value_t = 3)]
    pub fadvise: u8,

    /// Milliseconds to sleep after each block, as a throttle
    #[arg(short = 'p', long, default_value_t = 0)]
    pub pause: u64,

    /// Transport cipher hint passed to the remote shell
    #[arg(short = 'c', long, default_value = "blowfish")]
    pub cipher: String,

    /// Request transport compression
    #[arg(short = 'C', long, default_value_t = true)]
    pub compress: bool,

    /// Transport key file
    #[arg(short = 'i', long)]
    pub id: Option<PathBuf>,

    /// Name of an environment variable holding the transport password
    #[arg(short = 'P', long)]
    pub pass: Option<String>,

    /// Wrap the remote agent invocation in a privilege-elevation command
    #[arg(short = 's', long, default_value_t = false)]
    pub sudo: bool,

    /// Extra arguments appended verbatim to the transport invocation
    #[arg(short = 'x', long)]
    pub extraparams: Option<String>,

    /// Compare only; never write to the destination
    #[arg(short = 'n', long, default_value_t = false)]
    pub dryrun: bool,

    /// Create or extend the destination to the source's size before syncing
    #[arg(short = 'T', long, default_value_t = false)]
    pub createdest: bool,

    /// Path to a pre-installed agent script or binary on the remote host
    #[arg(short = 'S', long)]
    pub script: Option<String>,

    /// Interpreter used to run an uploaded agent script
    #[arg(short = 'I', long)]
    pub interpreter: Option<String>,

    /// Seconds between progress reports
    #[arg(short = 't', long, default_value_t = 1)]
    pub interval: u64,

    /// Log file; defaults to stderr/stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Internal agent-invocation verbs; never typed by an end user directly
#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Run as a persistent agent for one destination device
    Server {
        /// Destination block device or file path
        dest: String,
        #[command(flatten)]
        session: SessionFlags,
    },
    /// Run as an agent that deletes its own script file on exit
    Tmpserver {
        /// Destination block device or file path
        dest: String,
        #[command(flatten)]
        session: SessionFlags,
    },
    /// Run as one worker's driver half; how the supervisor re-invokes itself
    /// per chunk. Not part of the public interface.
    #[command(hide = true)]
    Driver {
        source: PathBuf,
        dest_host: String,
        dest_path: String,
        #[arg(long)]
        worker: usize,
        #[arg(long)]
        start_block: u64,
        #[arg(long)]
        block_count: u64,
        #[command(flatten)]
        session: SessionFlags,
    },
}

/// Hash algorithms available for block comparison
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// SHA-512, the default primary algorithm
    #[default]
    Sha512,
    /// SHA-256, a shorter cryptographic digest
    Sha256,
    /// BLAKE3, a fast cryptographic hash from a different family than SHA-2
    Blake3,
    /// XXH3 (128-bit), non-cryptographic
    Xxh3,
    /// XXH64, non-cryptographic, narrower than XXH3
    Xxh64,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Xxh3 => "xxh3",
            HashAlgorithm::Xxh64 => "xxh64",
        };
        f.write_str(name)
    }
}

/// Bitmask controlling `posix_fadvise` hints on each side of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadvisePolicy {
    pub local: bool,
    pub remote: bool,
}

impl FadvisePolicy {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            local: bits & 0b01 != 0,
            remote: bits & 0b10 != 0,
        }
    }

    /// The advertisement string sent over the wire during the handshake, e.g. "3"
    pub fn wire_value(self) -> u8 {
        (self.local as u8) | ((self.remote as u8) << 1)
    }
}

/// Immutable, validated parameters shared by the supervisor and every worker
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub workers: usize,
    pub splay: Duration,
    pub blocksize: u64,
    pub hash: HashAlgorithm,
    pub additionalhash: Option<HashAlgorithm>,
    pub fadvise: FadvisePolicy,
    pub pause: Duration,
    pub cipher: String,
    pub compress: bool,
    pub id: Option<PathBuf>,
    pub pass: Option<String>,
    pub sudo: bool,
    pub extraparams: Option<String>,
    pub dryrun: bool,
    pub createdest: bool,
    pub script: Option<String>,
    pub interpreter: Option<String>,
    pub interval: Duration,
    pub output: Option<PathBuf>,
}

impl SessionParams {
    /// Validate and convert the flattened CLI flags into immutable session parameters
    pub fn from_flags(flags: &SessionFlags) -> Result<Self> {
        if flags.workers == 0 {
            return Err(SyncError::config("--workers must be at least 1"));
        }
        if flags.blocksize == 0 {
            return Err(SyncError::config("--blocksize must be greater than 0"));
        }
        if let Some(secondary) = flags.additionalhash {
            if secondary == flags.hash {
                return Err(SyncError::config(
                    "--additionalhash must differ from the primary --hash algorithm",
                ));
            }
        }

        Ok(Self {
            workers: flags.workers,
            splay: Duration::from_millis(flags.splay),
            blocksize: flags.blocksize,
            hash: flags.hash,
            additionalhash: flags.additionalhash,
            fadvise: FadvisePolicy::from_bits(flags.fadvise),
            pause: Duration::from_millis(flags.pause),
            cipher: flags.cipher.clone(),
            compress: flags.compress,
            id: flags.id.clone(),
            pass: flags.pass.clone(),
            sudo: flags.sudo,
            extraparams: flags.extraparams.clone(),
            dryrun: flags.dryrun,
            createdest: flags.createdest,
            script: flags.script.clone(),
            interpreter: flags.interpreter.clone(),
            interval: Duration::from_secs(flags.interval),
            output: flags.output.clone(),
        })
    }
}

/// Parse a size with an optional `K`/`M`/`G`/`T` suffix (case-insensitive, base 1024)
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size".to_string());
    }

    let (digits, multiplier) = match s.chars().last().unwrap().to_ascii_uppercase() {
        'K' => (&s[..s.len() - 1], 1024u64),
        'M' => (&s[..s.len() - 1], 1024 * 1024),
        'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        'T' => (&s[..s.len() - 1], 1024u64 * 1024 * 1024 * 1024),
        'B' => (&s[..s.len() - 1], 1),
        _ => (s, 1),
    };

    digits
        .trim()
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|e| format!("invalid size '{s}': {e}"))
}
