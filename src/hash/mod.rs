//! Block hashing module
//!
//! Provides the digest algorithms used to compare destination and source
//! blocks: SHA-512 (the default primary), SHA-256, BLAKE3, and XXH3/XXH64
//! for callers that don't need cryptographic strength. All hashers produce
//! raw digest bytes — the wire protocol never hex-encodes a hash.

mod digest;

pub use digest::*;
