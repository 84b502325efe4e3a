//! Wire protocol: a text handshake followed by strictly alternating binary streaming
//!
//! Every line is newline-terminated ASCII; every hash and block payload on
//! the streaming side is raw bytes with no length prefix, since both ends
//! agree on lengths during the handshake. See the driver and agent modules
//! for the two sides of this protocol.

use std::io::{BufRead, Read, Write};

use crate::error::{Result, SyncError};

/// A driver's verdict on one block comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Same,
    Diff,
}

impl Verdict {
    pub fn to_byte(self) -> u8 {
        match self {
            Verdict::Same => b'0',
            Verdict::Diff => b'1',
        }
    }

    pub fn from_byte(worker: usize, byte: u8) -> Result<Self> {
        match byte {
            b'0' => Ok(Verdict::Same),
            b'1' => Ok(Verdict::Diff),
            other => Err(SyncError::handshake(
                worker,
                format!("unexpected verdict byte {other}"),
            )),
        }
    }
}

/// The cache-advisor mode an agent actually applied, as advertised in the handshake
pub fn advisory_label(enabled: bool) -> &'static str {
    if !enabled {
        "Disabled"
    } else if cfg!(unix) {
        "NOREUSE"
    } else {
        "None"
    }
}

/// Destination size and block size the agent echoed back during the handshake
#[derive(Debug, Clone)]
pub struct AgentAdvertisement {
    pub dest_path: String,
    pub blocksize: u64,
    pub remote_size: u64,
}

fn write_line(writer: &mut impl Write, line: &str) -> Result<()> {
    writer
        .write_all(format!("{line}\n").as_bytes())
        .map_err(SyncError::from)
}

fn read_line(worker: usize, reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .map_err(|e| SyncError::handshake(worker, format!("reading handshake line: {e}")))?;
    if n == 0 {
        return Err(SyncError::handshake(worker, "connection closed during handshake"));
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Driver side of the handshake. Sends the create-size and chunk bounds,
/// validates the agent's echoed destination path and block size, and
/// returns the destination's reported size.
pub fn driver_handshake(
    worker: usize,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    create_size: u64,
    expected_dest: &str,
    blocksize: u64,
    startpos: u64,
    block_count: u64,
) -> Result<AgentAdvertisement> {
    let init = read_line(worker, reader)?;
    if init != "init" {
        return Err(SyncError::handshake(
            worker,
            format!("expected 'init', got '{init}'"),
        ));
    }
    let _advisory = read_line(worker, reader)?;

    write_line(writer, &create_size.to_string())?;

    let advertised = read_line(worker, reader)?;
    let mut parts = advertised.splitn(2, ' ');
    let dest_path = parts
        .next()
        .ok_or_else(|| SyncError::handshake(worker, "missing destination path in advertisement"))?
        .to_string();
    let agent_blocksize: u64 = parts
        .next()
        .ok_or_else(|| SyncError::handshake(worker, "missing block size in advertisement"))?
        .parse()
        .map_err(|e| SyncError::handshake(worker, format!("bad block size: {e}")))?;

    if dest_path != expected_dest {
        return Err(SyncError::DestinationMismatch {
            worker,
            requested: expected_dest.to_string(),
            reported: dest_path,
        });
    }
    if agent_blocksize != blocksize {
        return Err(SyncError::BlockSizeMismatch {
            worker,
            driver: blocksize as usize,
            agent: agent_blocksize as usize,
        });
    }

    let remote_size: u64 = read_line(worker, reader)?
        .parse()
        .map_err(|e| SyncError::handshake(worker, format!("bad remote size: {e}")))?;

    write_line(writer, &startpos.to_string())?;
    write_line(writer, &block_count.to_string())?;

    Ok(AgentAdvertisement {
        dest_path,
        blocksize: agent_blocksize,
        remote_size,
    })
}

/// Agent side of the handshake. Returns the create-size request and the
/// chunk bounds the driver wants streamed.
pub fn agent_handshake(
    worker: usize,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    advisory: &str,
    dest_path: &str,
    blocksize: u64,
    current_size: impl FnOnce(u64) -> Result<u64>,
) -> Result<(u64, u64, u64)> {
    write_line(writer, "init")?;
    write_line(writer, advisory)?;

    let create_size: u64 = read_line(worker, reader)?
        .parse()
        .map_err(|e| SyncError::handshake(worker, format!("bad create size: {e}")))?;

    let remote_size = current_size(create_size)?;

    write_line(writer, &format!("{dest_path} {blocksize}"))?;
    write_line(writer, &remote_size.to_string())?;

    let startpos: u64 = read_line(worker, reader)?
        .parse()
        .map_err(|e| SyncError::handshake(worker, format!("bad start position: {e}")))?;
    let block_count: u64 = read_line(worker, reader)?
        .parse()
        .map_err(|e| SyncError::handshake(worker, format!("bad block count: {e}")))?;

    Ok((create_size, startpos, block_count))
}

/// Read exactly `len` raw bytes from the streaming channel
pub fn read_exact_bytes(worker: usize, reader: &mut impl Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|e| SyncError::handshake(worker, format!("short read on stream: {e}")))?;
    Ok(buf)
}

/// Read a single verdict byte from the streaming channel
pub fn read_verdict(worker: usize, reader: &mut impl Read) -> Result<Verdict> {
    let mut byte = [0u8; 1];
    reader
        .read_exact(&mut byte)
        .map_err(|e| SyncError::handshake(worker, format!("short read on verdict: {e}")))?;
    Verdict::from_byte(worker, byte[0])
}

/// Write a single verdict byte to the streaming channel
pub fn write_verdict(writer: &mut impl Write, verdict: Verdict) -> Result<()> {
    writer
        .write_all(&[verdict.to_byte()])
        .map_err(SyncError::from)
}
