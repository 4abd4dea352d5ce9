use std::sync::Arc;

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry, proto::MetricFamily};

use stevedore_core::{JobOutcome, MetricsBackend, SkipReason};

const NAMESPACE: &str = "stevedore";

/// Prometheus metrics backend.
///
/// ## Label cardinality
/// - `trigger`: "cron", "date", "interval"
/// - `outcome`: "success", "failure", "error"
/// - `reason`: "paused", "max_instances", "missed", "stale"
/// - `operation`: runtime calls such as "exec", "inspect", "events"
#[derive(Clone)]
pub struct PrometheusMetrics {
    jobs_started: CounterVec,
    jobs_completed: CounterVec,
    job_duration: HistogramVec,
    jobs_skipped: CounterVec,
    runtime_errors: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let jobs_started = CounterVec::new(
            Opts::new("jobs_started_total", "Job commands handed to the container runtime")
                .namespace(NAMESPACE),
            &["trigger"],
        )?;
        registry.register(Box::new(jobs_started.clone()))?;

        let jobs_completed = CounterVec::new(
            Opts::new("jobs_completed_total", "Job executions that finished").namespace(NAMESPACE),
            &["trigger", "outcome"],
        )?;
        registry.register(Box::new(jobs_completed.clone()))?;

        let job_duration = HistogramVec::new(
            HistogramOpts::new("job_duration_seconds", "Job command duration in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
            &["trigger"],
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        let jobs_skipped = CounterVec::new(
            Opts::new("jobs_skipped_total", "Due firings that did not run").namespace(NAMESPACE),
            &["trigger", "reason"],
        )?;
        registry.register(Box::new(jobs_skipped.clone()))?;

        let runtime_errors = CounterVec::new(
            Opts::new("runtime_errors_total", "Failed container runtime calls").namespace(NAMESPACE),
            &["operation"],
        )?;
        registry.register(Box::new(runtime_errors.clone()))?;

        Ok(Self {
            jobs_started,
            jobs_completed,
            job_duration,
            jobs_skipped,
            runtime_errors,
            registry,
        })
    }

    /// Backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metrics for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_job_started(&self, trigger: &str) {
        self.jobs_started.with_label_values(&[trigger]).inc();
    }

    fn record_job_completed(&self, trigger: &str, outcome: JobOutcome, duration_ms: u64) {
        self.jobs_completed
            .with_label_values(&[trigger, outcome.as_label()])
            .inc();
        self.job_duration
            .with_label_values(&[trigger])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_job_skipped(&self, trigger: &str, reason: SkipReason) {
        self.jobs_skipped
            .with_label_values(&[trigger, reason.as_label()])
            .inc();
    }

    fn record_runtime_error(&self, operation: &str) {
        self.runtime_errors.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("metric {name} not found"))
    }

    #[test]
    fn started_jobs_are_counted_per_trigger() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_job_started("cron");
        metrics.record_job_started("cron");
        metrics.record_job_started("interval");

        let families = metrics.gather();
        let started = family(&families, "stevedore_jobs_started_total");
        assert_eq!(started.get_metric().len(), 2);
    }

    #[test]
    fn completion_updates_counter_and_histogram() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_job_completed("cron", JobOutcome::Success, 150);
        metrics.record_job_completed("cron", JobOutcome::Failure, 50);
        metrics.record_job_completed("cron", JobOutcome::Error, 1);

        let families = metrics.gather();
        assert_eq!(family(&families, "stevedore_jobs_completed_total").get_metric().len(), 3);

        let duration = family(&families, "stevedore_job_duration_seconds");
        assert_eq!(duration.get_metric().len(), 1);
        assert_eq!(duration.get_metric()[0].get_histogram().get_sample_count(), 3);
    }

    #[test]
    fn skips_are_labelled_by_reason() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_job_skipped("interval", SkipReason::MaxInstances);
        metrics.record_job_skipped("interval", SkipReason::MaxInstances);
        metrics.record_job_skipped("date", SkipReason::Missed);

        let families = metrics.gather();
        let skipped = family(&families, "stevedore_jobs_skipped_total");
        assert_eq!(skipped.get_metric().len(), 2);
        let total: f64 = skipped
            .get_metric()
            .iter()
            .map(|m| m.get_counter().value())
            .sum();
        assert_eq!(total, 3.0);
    }

    #[test]
    fn runtime_errors_are_counted_per_operation() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_runtime_error("exec");
        metrics.record_runtime_error("events");

        let families = metrics.gather();
        assert_eq!(family(&families, "stevedore_runtime_errors_total").get_metric().len(), 2);
    }

    #[test]
    fn shared_registry_fails_on_double_registration() {
        let registry = Arc::new(Registry::new());
        let metrics = PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        metrics.record_job_started("cron");

        assert!(!registry.gather().is_empty());
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
