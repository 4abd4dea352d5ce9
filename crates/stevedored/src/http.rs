//! Introspection endpoints.
//!
//! Routes:
//! - GET /jobs - scheduled jobs as JSON
//! - GET /healthz - liveness
//! - GET /metrics - Prometheus text exposition
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::error;

use stevedore_core::scheduler::{ScheduledJob, Scheduler};
use stevedore_prometheus::{PrometheusMetrics, TextEncoder};

#[derive(Clone)]
pub struct HttpState {
    pub scheduler: Scheduler,
    pub metrics: PrometheusMetrics,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct JobsResponse {
    count: usize,
    jobs: Vec<ScheduledJob>,
}

/// GET /jobs
async fn list_jobs(State(state): State<HttpState>) -> Json<JobsResponse> {
    let jobs = state.scheduler.jobs();
    Json(JobsResponse {
        count: jobs.len(),
        jobs,
    })
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}

/// GET /metrics
async fn metrics(State(state): State<HttpState>) -> Response {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&state.metrics.gather()) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus_content_type(&encoder))], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

fn prometheus_content_type(encoder: &TextEncoder) -> String {
    use stevedore_prometheus::Encoder;
    encoder.format_type().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::body::to_bytes;
    use stevedore_core::MetricsBackend;
    use stevedore_core::events::EventBus;
    use stevedore_core::scheduler::SchedulerConfig;
    use stevedore_model::{JobValidator, RawJob, ValidatorConfig};

    use super::*;
    use crate::testing::StaticRuntime;

    fn state() -> HttpState {
        let metrics = PrometheusMetrics::new().unwrap();
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(StaticRuntime::default()),
            EventBus::empty(),
            Arc::new(metrics.clone()),
        );
        HttpState { scheduler, metrics }
    }

    #[tokio::test]
    async fn jobs_lists_scheduled_jobs() {
        let state = state();
        let mut raw = RawJob::new("backup");
        raw.set("command", "backup.sh").set("cron", "0 3 * * *").set("user", "root");
        let def = JobValidator::new(ValidatorConfig::default())
            .unwrap()
            .validate(&raw)
            .unwrap();
        state
            .scheduler
            .add("c1", &BTreeMap::from([(def.name.clone(), def)]), true);

        let Json(resp) = list_jobs(State(state)).await;
        assert_eq!(resp.count, 1);
        assert_eq!(resp.jobs[0].definition.name, "backup");
        assert!(resp.jobs[0].paused);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["jobs"][0]["container_id"], "c1");
    }

    #[tokio::test]
    async fn metrics_are_exposed_as_text() {
        let state = state();
        state.metrics.record_job_started("cron");

        let resp = metrics(State(state)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("stevedore_jobs_started_total{trigger=\"cron\"} 1"));
    }

    #[tokio::test]
    async fn healthz_answers() {
        assert_eq!(healthz().await, "ok");
    }
}
