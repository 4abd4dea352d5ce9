use std::io;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stevedore_core::scheduler::Scheduler;

/// Listen for SIGINT and SIGTERM (cancel the returned token) and SIGUSR1 (log all jobs).
pub fn install(scheduler: Scheduler) -> io::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    info!("keyboard interrupt, shutting down");
                    break;
                }
                _ = sigusr1.recv() => dump_jobs(&scheduler),
            }
        }
        cancel.cancel();
    });
    Ok(token)
}

/// Log every scheduled job with its full definition.
pub fn dump_jobs(scheduler: &Scheduler) {
    let jobs = scheduler.jobs();
    info!(jobs = jobs.len(), "dumping scheduled jobs");
    for job in jobs {
        let definition = match serde_json::to_string(&job.definition) {
            Ok(json) => json,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "cannot serialize job definition");
                continue;
            }
        };
        info!(
            job_id = %job.id,
            job = %job.definition.name,
            container = %job.container_id,
            paused = job.paused,
            next_run = ?job.next_run,
            %definition,
            "scheduled job"
        );
    }
}
