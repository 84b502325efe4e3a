//! The agent half of a worker: runs as `server`/`tmpserver`, owns the
//! destination device, and answers the driver's hash comparisons over
//! stdin/stdout.

use std::io::{stdin, stdout, BufReader};

use tracing::{info, warn};

use crate::config::SessionParams;
use crate::error::Result;
use crate::fs::{CacheAdvisor, Device};
use crate::hash::hash_block;
use crate::network::{advisory_label, agent_handshake, read_exact_bytes, read_verdict, Verdict};

/// Run this process as an agent for `dest`, over stdin/stdout.
///
/// `self_delete` removes this process's own executable image once the
/// stream ends, for the one-shot `tmpserver` upload path.
pub fn run_agent(dest: &str, session: &SessionParams, self_delete: bool) -> Result<()> {
    let stdin = stdin();
    let stdout = stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let advisor = CacheAdvisor::new(session.fadvise.remote);
    let mut device_slot: Option<Device> = None;

    let (_, startpos, block_count) = agent_handshake(
        0,
        &mut reader,
        &mut writer,
        advisory_label(session.fadvise.remote),
        dest,
        session.blocksize,
        |create_size| {
            let device = Device::open_read_write(
                dest,
                if create_size > 0 { Some(create_size) } else { None },
                advisor,
            )?;
            let size = device.size();
            device_slot = Some(device);
            Ok(size)
        },
    )?;

    let device = device_slot.expect("handshake closure always opens the device before returning");

    for i in 0..block_count {
        let block_index = startpos + i;
        let block = device.read_block(block_index, session.blocksize)?;

        let digest = hash_block(session.hash, &block);
        std::io::Write::write_all(&mut writer, &digest)?;
        if let Some(secondary) = session.additionalhash {
            let digest2 = hash_block(secondary, &block);
            std::io::Write::write_all(&mut writer, &digest2)?;
        }

        let verdict = read_verdict(0, &mut reader)?;
        if verdict == Verdict::Diff {
            let payload = read_exact_bytes(0, &mut reader, block.len())?;
            device.write_block(block_index, session.blocksize, &payload)?;
        }
    }

    info!(blocks = block_count, "agent finished streaming its chunk");

    if self_delete {
        if let Ok(exe) = std::env::current_exe() {
            if let Err(e) = std::fs::remove_file(&exe) {
                warn!(error = %e, path = %exe.display(), "failed to remove uploaded agent binary");
            }
        }
    }

    Ok(())
}
