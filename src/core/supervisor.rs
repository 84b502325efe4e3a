//! Partitions the source device across workers, spawns one driver process
//! per chunk, and aggregates their exit status.
//!
//! Each driver runs as this same binary re-invoked with the hidden `driver`
//! subcommand, carrying its chunk bounds and the session parameters as CLI
//! flags — OS-level process isolation, per the concurrency model, without
//! relying on `fork(2)` inside a binary that may already be multi-threaded.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::SessionParams;
use crate::error::{Result, SyncError};

/// Open the writer for the human-facing messages (destructive-change
/// banner, five-second notice, final summary) that `-o/--output` is
/// documented to redirect — the same file `tracing`'s subscriber writes
/// to, opened independently since these lines aren't `tracing` events.
fn human_output(session: &SessionParams) -> Result<Box<dyn Write>> {
    match &session.output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| SyncError::io(path, e))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stderr())),
    }
}

/// One partition of the source device: `[start_block, start_block + block_count)`
#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub worker: usize,
    pub start_block: u64,
    pub block_count: u64,
}

/// Split `total_blocks` into `workers` contiguous chunks; the last chunk
/// absorbs whatever remainder doesn't divide evenly.
pub fn partition(total_blocks: u64, workers: usize) -> Vec<Chunk> {
    let workers = workers.max(1) as u64;
    let base = total_blocks / workers;
    (0..workers)
        .map(|i| {
            let start_block = i * base;
            let block_count = if i == workers - 1 {
                total_blocks - start_block
            } else {
                base
            };
            Chunk {
                worker: i as usize,
                start_block,
                block_count,
            }
        })
        .collect()
}

/// Run the full sync: banner, partition, spawn, splay, reap, abort-on-failure.
pub fn run_supervisor(
    source_path: &Path,
    dest_host: &str,
    dest_path: &str,
    session: &SessionParams,
) -> Result<()> {
    let size = std::fs::metadata(source_path)
        .map_err(|e| SyncError::io(source_path, e))?
        .len();
    let total_blocks = size.div_ceil(session.blocksize);

    let mut out = human_output(session)?;
    writeln!(
        out,
        "DESTRUCTIVE CHANGE: about to sync {} -> {}:{} ({} blocks of {} bytes){}",
        source_path.display(),
        dest_host,
        dest_path,
        total_blocks,
        session.blocksize,
        if session.dryrun { " [dry run]" } else { "" },
    )
    .map_err(SyncError::from)?;
    if !session.dryrun {
        writeln!(out, "waiting 5 seconds, ctrl-c to abort...").map_err(SyncError::from)?;
        thread::sleep(Duration::from_secs(5));
    }

    let chunks = partition(total_blocks, session.workers);
    info!(
        workers = chunks.len(),
        total_blocks, blocksize = session.blocksize, "starting sync"
    );

    let exe = std::env::current_exe().map_err(|e| SyncError::config(format!("resolving self path: {e}")))?;

    let mut children: Vec<(usize, Child)> = Vec::with_capacity(chunks.len());
    for (idx, chunk) in chunks.iter().enumerate() {
        let mut cmd = Command::new(&exe);
        build_driver_argv(&mut cmd, source_path, dest_host, dest_path, session, chunk);

        let child = cmd
            .spawn()
            .map_err(|e| SyncError::transport(chunk.worker, format!("spawning driver: {e}")))?;
        children.push((chunk.worker, child));

        if idx + 1 < chunks.len() {
            thread::sleep(session.splay);
        }
    }

    reap_until_done(children, out)
}

fn build_driver_argv(
    cmd: &mut Command,
    source_path: &Path,
    dest_host: &str,
    dest_path: &str,
    session: &SessionParams,
    chunk: &Chunk,
) {
    cmd.arg("driver")
        .arg(source_path)
        .arg(dest_host)
        .arg(dest_path)
        .arg("--worker")
        .arg(chunk.worker.to_string())
        .arg("--start-block")
        .arg(chunk.start_block.to_string())
        .arg("--block-count")
        .arg(chunk.block_count.to_string())
        .arg("-w")
        .arg("1")
        .arg("-b")
        .arg(session.blocksize.to_string())
        .arg("-1")
        .arg(session.hash.to_string())
        .arg("-d")
        .arg(
            ((session.fadvise.local as u8) | ((session.fadvise.remote as u8) << 1)).to_string(),
        )
        .arg("-p")
        .arg(session.pause.as_millis().to_string())
        .arg("-c")
        .arg(&session.cipher)
        .arg("-t")
        .arg(session.interval.as_secs().to_string());

    if let Some(secondary) = session.additionalhash {
        cmd.arg("-2").arg(secondary.to_string());
    }
    if session.sudo {
        cmd.arg("-s");
    }
    if session.dryrun {
        cmd.arg("-n");
    }
    if session.createdest {
        cmd.arg("-T");
    }
    if let Some(id) = &session.id {
        cmd.arg("-i").arg(id);
    }
    if let Some(pass) = &session.pass {
        cmd.arg("-P").arg(pass);
    }
    if let Some(extra) = &session.extraparams {
        cmd.arg("-x").arg(extra);
    }
    if let Some(script) = &session.script {
        cmd.arg("-S").arg(script);
    }
    if let Some(interpreter) = &session.interpreter {
        cmd.arg("-I").arg(interpreter);
    }
    if let Some(output) = &session.output {
        cmd.arg("-o").arg(output);
    }
}

/// Wait on every spawned driver; on the first non-zero exit, terminate the
/// rest and keep reaping until none remain.
fn reap_until_done(mut children: Vec<(usize, Child)>, mut out: Box<dyn Write>) -> Result<()> {
    let mut aborting = false;
    let mut failure: Option<SyncError> = None;

    while !children.is_empty() {
        let mut still_running = Vec::with_capacity(children.len());
        for (worker, mut child) in children {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() && !aborting {
                        aborting = true;
                        error!(worker, status = status.code(), "worker failed, aborting run");
                        failure = Some(SyncError::PeerProcess {
                            worker,
                            status: status.code().unwrap_or(-1),
                        });
                    }
                }
                Ok(None) => {
                    if aborting {
                        terminate(&child);
                    }
                    still_running.push((worker, child));
                }
                Err(e) => {
                    warn!(worker, error = %e, "failed to poll worker status");
                }
            }
        }
        children = still_running;
        if !children.is_empty() {
            thread::sleep(Duration::from_millis(50));
        }
    }

    match failure {
        Some(err) => Err(err),
        None => {
            writeln!(out, "sync completed successfully").map_err(SyncError::from)?;
            Ok(())
        }
    }
}

#[cfg(unix)]
fn terminate(child: &Child) {
    let pid = nix::unistd::Pid::from_raw(child.id() as i32);
    let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}
