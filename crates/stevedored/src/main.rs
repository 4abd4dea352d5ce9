//! stevedored: runs jobs declared in container labels inside those containers.
//!
//! Exit codes: 0 normal shutdown, 1 configuration error, 2 another instance is running,
//! 3 unhandled error.
mod app;
mod config;
mod exit;
mod http;
mod instance;
mod lockfile;
mod signals;

#[cfg(test)]
mod testing;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use tracing::{error, info, warn};

use stevedore_observe::{init_local_offset, init_logger};

use crate::config::{Cli, DaemonConfig};
use crate::exit::ExitReason;

fn main() -> ExitCode {
    // Before any thread exists, see `init_local_offset`.
    init_local_offset();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitReason::Config(e.kind().to_string()).into();
        }
    };
    let cfg = match DaemonConfig::try_from(cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitReason::from(e).into();
        }
    };
    if let Err(e) = init_logger(&cfg.logger) {
        eprintln!("cannot initialize logging: {e}");
        return ExitReason::Config(e.to_string()).into();
    }
    for warning in &cfg.warnings {
        warn!("{warning}");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "stevedore started");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "cannot start the async runtime");
            return ExitReason::Unhandled(e.into()).into();
        }
    };

    match runtime.block_on(app::run(cfg)) {
        Ok(()) => {
            info!("stevedore stopped");
            ExitCode::SUCCESS
        }
        Err(reason) => {
            error!(exit_code = reason.code(), "{reason}");
            reason.into()
        }
    }
}
