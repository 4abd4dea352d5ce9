//! Prometheus backend for stevedore job metrics.
//!
//! [`PrometheusMetrics`] implements [`stevedore_core::MetricsBackend`]; the daemon serves
//! [`PrometheusMetrics::gather`] on its `/metrics` endpoint.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use stevedore_core::MetricsHandle;
//! use stevedore_prometheus::{PrometheusMetrics, TextEncoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//!
//! let body = TextEncoder::new().encode_to_string(&metrics.gather())?;
//! # let _ = (handle, body);
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `stevedore_jobs_started_total{trigger}` - Counter
//! - `stevedore_jobs_completed_total{trigger, outcome}` - Counter
//! - `stevedore_job_duration_seconds{trigger}` - Histogram
//! - `stevedore_jobs_skipped_total{trigger, reason}` - Counter
//! - `stevedore_runtime_errors_total{operation}` - Counter

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
