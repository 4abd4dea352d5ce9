//! Daemon lifecycle: startup checks, event loop, graceful shutdown.
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use stevedore_core::engine::Engine;
use stevedore_core::events::{EventBus, Subscribe};
use stevedore_core::labels::LabelParser;
use stevedore_core::runtime::ContainerRuntime;
use stevedore_core::scheduler::Scheduler;
use stevedore_core::MetricsHandle;
use stevedore_docker::DockerRuntime;
use stevedore_observe::JobLogger;
use stevedore_prometheus::PrometheusMetrics;

use crate::config::DaemonConfig;
use crate::exit::ExitReason;
use crate::http::{self, HttpState};
use crate::instance::another_instance_running;
use crate::lockfile::LockFile;
use crate::signals;

/// Run until SIGINT or SIGTERM; the lock file is released last.
pub async fn run(cfg: DaemonConfig) -> Result<(), ExitReason> {
    let lock = LockFile::acquire(&cfg.lock_file)?;
    info!(path = %lock.path().display(), "holding lock file");

    let docker = DockerRuntime::connect(&cfg.docker).map_err(|e| ExitReason::Config(e.to_string()))?;
    docker
        .ping()
        .await
        .map_err(|e| ExitReason::Config(format!("docker at {} is unreachable: {e}", cfg.docker.host)))?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    if another_instance_running(runtime.as_ref(), &cfg.self_image_name)
        .await
        .context("looking for other daemon containers")?
    {
        return Err(ExitReason::AnotherInstance(
            "there is another daemon container, maybe paused or restarting".to_string(),
        ));
    }

    let metrics = PrometheusMetrics::new().context("registering metrics")?;
    let metrics_handle: MetricsHandle = Arc::new(metrics.clone());
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(JobLogger)];
    let scheduler = Scheduler::new(
        cfg.scheduler.clone(),
        Arc::clone(&runtime),
        EventBus::new(subscribers),
        Arc::clone(&metrics_handle),
    );
    let parser = LabelParser::new(cfg.parser.clone(), Arc::clone(&runtime))
        .map_err(|e| ExitReason::Config(e.to_string()))?;
    let mut engine = Engine::new(runtime, parser, scheduler.clone(), metrics_handle);

    let shutdown = signals::install(scheduler.clone()).context("installing signal handlers")?;
    if let Some(addr) = cfg.http_listen {
        serve_http(addr, HttpState { scheduler: scheduler.clone(), metrics }, shutdown.clone()).await?;
    }

    let since = engine
        .inspect_existing()
        .await
        .context("inspecting running containers")?;
    info!(jobs = scheduler.len(), "initial inspection done");

    engine.run(since, shutdown).await;

    if scheduler.shutdown(cfg.shutdown_grace).await {
        info!("all running jobs finished");
    } else {
        warn!(grace = ?cfg.shutdown_grace, "running jobs did not finish within the grace period, abandoning them");
    }
    drop(lock);
    Ok(())
}

async fn serve_http(
    addr: std::net::SocketAddr,
    state: HttpState,
    shutdown: CancellationToken,
) -> Result<(), ExitReason> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ExitReason::Config(format!("cannot listen on {addr}: {e}")))?;
    info!(%addr, "serving /jobs, /healthz and /metrics");

    tokio::spawn(async move {
        let server = axum::serve(listener, http::router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
        if let Err(e) = server.await {
            error!(error = %e, "http server failed");
        }
    });
    Ok(())
}
