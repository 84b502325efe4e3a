//! Wire protocol and transport launching
//!
//! `protocol` implements the handshake and streaming codec shared by the
//! driver and agent. `transport` builds the subprocess that runs an agent,
//! locally or over a remote shell.

mod protocol;
mod transport;

pub use protocol::*;
pub use transport::*;
