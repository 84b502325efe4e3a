//! The driver half of a worker: owns the source device, spawns its agent,
//! and streams block comparisons for one chunk of the device.

use std::io::{BufReader, Write};
use std::path::Path;
use std::thread;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::SessionParams;
use crate::error::{Result, SyncError};
use crate::fs::{CacheAdvisor, Device};
use crate::hash::hash_block;
use crate::network::{
    advisory_label, driver_handshake, read_exact_bytes, write_verdict, Destination, TransportLauncher, Verdict,
};
use crate::progress::{estimate_remaining, throughput_bytes_per_sec};

/// Totals a driver accumulates over its chunk, for the supervisor's summary
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverStats {
    pub same: u64,
    pub diff: u64,
}

/// Stream one worker's chunk: compare every block in `[start_block, start_block + block_count)`
/// against the destination reached via `dest_host`/`dest_path`.
pub fn run_driver(
    worker: usize,
    source_path: &Path,
    dest_host: &str,
    dest_path: &str,
    session: &SessionParams,
    start_block: u64,
    block_count: u64,
) -> Result<DriverStats> {
    let advisor = CacheAdvisor::new(session.fadvise.local);
    let source = Device::open_read_only(source_path, advisor)?;

    let destination = Destination::parse(dest_host);
    let launcher = TransportLauncher::new(session);
    let (role, agent_path) = launcher.resolve_agent_path(worker, &destination)?;

    let create_size = if session.createdest { source.size() } else { 0 };

    let mut cmd = launcher.build(worker, &destination, &agent_path, role, dest_path);
    let mut child = cmd
        .spawn()
        .map_err(|e| SyncError::transport(worker, format!("spawning agent: {e}")))?;

    let mut reader = BufReader::new(
        child
            .stdout
            .take()
            .ok_or_else(|| SyncError::transport(worker, "agent stdout not piped"))?,
    );
    let mut writer = child
        .stdin
        .take()
        .ok_or_else(|| SyncError::transport(worker, "agent stdin not piped"))?;

    let advertisement = driver_handshake(
        worker,
        &mut reader,
        &mut writer,
        create_size,
        dest_path,
        session.blocksize,
        start_block,
        block_count,
    )?;

    if advertisement.remote_size < source.size() && !session.createdest {
        return Err(SyncError::DestinationTooSmall {
            worker,
            source_size: source.size(),
            dest_size: advertisement.remote_size,
        });
    }
    if advertisement.remote_size > source.size() {
        warn!(
            worker,
            source_size = source.size(),
            dest_size = advertisement.remote_size,
            "destination is larger than source, syncing only the source's prefix"
        );
    }

    info!(
        worker,
        blocksize = session.blocksize,
        fadvise = advisory_label(session.fadvise.local),
        chunk_start = start_block,
        chunk_blocks = block_count,
        "driver starting chunk"
    );

    let mut stats = DriverStats::default();
    let started = Instant::now();
    let mut last_report = started;
    let mut blocks_done = 0u64;
    let mut blocks_done_at_last_report = 0u64;

    for i in 0..block_count {
        let block_index = start_block + i;
        let block = source.read_block(block_index, session.blocksize)?;

        let expected_len = session.hash.digest_len();
        let remote_digest1 = read_exact_bytes(worker, &mut reader, expected_len)?;
        let remote_digest2 = match session.additionalhash {
            Some(secondary) => Some(read_exact_bytes(worker, &mut reader, secondary.digest_len())?),
            None => None,
        };

        let local_digest1 = hash_block(session.hash, &block);
        let mut same = local_digest1 == remote_digest1;
        if same {
            if let (Some(secondary), Some(remote_digest2)) = (session.additionalhash, &remote_digest2) {
                let local_digest2 = hash_block(secondary, &block);
                same = &local_digest2 == remote_digest2;
            }
        }

        if same {
            stats.same += 1;
            write_verdict(&mut writer, Verdict::Same)?;
        } else {
            stats.diff += 1;
            if session.dryrun {
                write_verdict(&mut writer, Verdict::Same)?;
            } else {
                write_verdict(&mut writer, Verdict::Diff)?;
                writer
                    .write_all(&block)
                    .map_err(|e| SyncError::transport(worker, format!("sending block payload: {e}")))?;
            }
        }

        blocks_done += 1;
        if !session.pause.is_zero() {
            thread::sleep(session.pause);
        }

        if last_report.elapsed() >= session.interval {
            let throughput = throughput_bytes_per_sec(
                blocks_done - blocks_done_at_last_report,
                session.blocksize,
                last_report.elapsed(),
            );
            let eta = estimate_remaining(blocks_done, block_count, started.elapsed());
            info!(
                worker,
                same = stats.same,
                diff = stats.diff,
                blocks_done,
                block_count,
                throughput = %format!("{}/s", humansize::format_size(throughput as u64, humansize::BINARY)),
                eta = %humantime::format_duration(eta),
                "progress"
            );
            last_report = Instant::now();
            blocks_done_at_last_report = blocks_done;
        }
    }

    let status = child
        .wait()
        .map_err(|e| SyncError::transport(worker, format!("waiting on agent: {e}")))?;
    if !status.success() {
        return Err(SyncError::PeerProcess {
            worker,
            status: status.code().unwrap_or(-1),
        });
    }

    info!(worker, same = stats.same, diff = stats.diff, "driver finished chunk");
    Ok(stats)
}
