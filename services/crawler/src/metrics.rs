//! Prometheus metrics exposition
//!
//! Metrics recorded across the workspace:
//!
//! - `pool_acquire_total` (counter): label `outcome`
//! - `pool_cooldowns_total` (counter): label `reason`
//! - `discovery_entities_total` (counter): label `kind`
//! - `refresh_entities_total` (counter): label `outcome`
//! - `content_checks_total` (counter): label `status`
//! - `content_alerts_total` (counter): label `transition`
//! - `crawler_job_duration_seconds` (histogram): labels `job`, `result`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Jobs run from seconds (a status check) to hours (a full discovery run).
const JOB_DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 28800.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("crawler_job_duration_seconds".to_string()),
        JOB_DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a finished job.
pub fn record_job(job: &'static str, ok: bool, duration_secs: f64) {
    let result = if ok { "ok" } else { "aborted" };
    metrics::histogram!("crawler_job_duration_seconds", "job" => job, "result" => result)
        .record(duration_secs);
}

/// Record a status change worth an operator's attention.
pub fn record_alert(transition: &'static str) {
    metrics::counter!("content_alerts_total", "transition" => transition).increment(1);
}
