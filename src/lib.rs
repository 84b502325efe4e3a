//! # blocksync
//!
//! Synchronizes a block device or large file across hosts by transferring
//! only the blocks that differ. A supervisor partitions the device into
//! contiguous chunks and spawns one driver/agent pair per chunk; each pair
//! independently walks its chunk comparing block hashes over a text
//! handshake followed by a binary streaming protocol, writing only the
//! blocks the comparison finds to differ.
//!
//! ## Quick start
//!
//! ```no_run
//! use blocksync::config::{CliArgs, SessionParams};
//! use blocksync::core::run_supervisor;
//! use clap::Parser;
//! use std::path::Path;
//!
//! let args = CliArgs::parse();
//! let session = SessionParams::from_flags(&args.session).unwrap();
//! run_supervisor(
//!     args.source.as_deref().unwrap_or(Path::new("/dev/source")),
//!     args.dest_host.as_deref().unwrap_or("localhost"),
//!     args.dest_path.as_deref().unwrap_or("/dev/dest"),
//!     &session,
//! )
//! .unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod hash;
pub mod network;
pub mod progress;

pub use config::{CliArgs, HashAlgorithm, SessionParams};
pub use core::{run_driver, run_supervisor, DriverStats};
pub use error::{Result, SyncError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient re-exports for common usage
pub mod prelude {
    //! ```no_run
    //! use blocksync::prelude::*;
    //! ```

    pub use crate::config::{CliArgs, FadvisePolicy, HashAlgorithm, Mode, SessionParams};
    pub use crate::core::{run_agent, run_driver, run_supervisor, DriverStats};
    pub use crate::error::{Result, SyncError};
    pub use crate::fs::{CacheAdvisor, Device};
    pub use crate::hash::{hash_block, BlockHasher};
}
