//! blocksync CLI entry point: dispatches to the supervisor, driver, or agent
//! role depending on how this binary was invoked.

use std::fs::File;
use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use blocksync::config::{CliArgs, Mode, SessionFlags, SessionParams};
use blocksync::core::{run_agent, run_driver, run_supervisor};
use blocksync::error::{Result, SyncError};

fn main() {
    let args = CliArgs::parse();
    init_logging(active_session_flags(&args));

    if let Err(e) = run(args) {
        tracing::error!(error = %e, "blocksync exited with an error");
        std::process::exit(1);
    }
}

fn active_session_flags(args: &CliArgs) -> &SessionFlags {
    match &args.command {
        Some(Mode::Server { session, .. }) => session,
        Some(Mode::Tmpserver { session, .. }) => session,
        Some(Mode::Driver { session, .. }) => session,
        None => &args.session,
    }
}

fn init_logging(flags: &SessionFlags) {
    let filter = EnvFilter::from_default_env();
    match &flags.output {
        Some(path) => match File::create(path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_writer(move || file.try_clone().expect("clone log file handle"))
                    .init();
            }
            Err(e) => {
                tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
                tracing::warn!(path = %path.display(), error = %e, "failed to open log file, logging to stderr");
            }
        },
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
        }
    }
}

fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Some(Mode::Server { dest, session }) => {
            let params = SessionParams::from_flags(&session)?;
            run_agent(&dest, &params, false)
        }
        Some(Mode::Tmpserver { dest, session }) => {
            let params = SessionParams::from_flags(&session)?;
            run_agent(&dest, &params, true)
        }
        Some(Mode::Driver {
            source,
            dest_host,
            dest_path,
            worker,
            start_block,
            block_count,
            session,
        }) => {
            let params = SessionParams::from_flags(&session)?;
            run_driver(
                worker,
                &source,
                &dest_host,
                &dest_path,
                &params,
                start_block,
                block_count,
            )
            .map(|_| ())
        }
        None => run_sync(args),
    }
}

fn run_sync(args: CliArgs) -> Result<()> {
    let source = args
        .source
        .ok_or_else(|| SyncError::config("missing SOURCE argument"))?;
    let dest_host = args
        .dest_host
        .ok_or_else(|| SyncError::config("missing DEST_HOST argument"))?;
    let dest_path = args
        .dest_path
        .unwrap_or_else(|| source.to_string_lossy().into_owned());

    let params = SessionParams::from_flags(&args.session)?;
    run_supervisor(Path::new(&source), &dest_host, &dest_path, &params)
}
