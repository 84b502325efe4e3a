//! Block device I/O
//!
//! Offset-based reads and writes against the source and destination
//! devices, plus the cache advisor that keeps a full-device sync from
//! evicting a host's page cache.

mod device;

pub use device::*;
