//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade into a process-wide Prometheus
//! recorder. When `SIDRA_PUSHGATEWAY_URL` is set, each stage pushes the
//! rendered registry to the Pushgateway once it finishes.

use crate::common::constants::PUSHGATEWAY_ENV;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

const PUSH_JOB: &str = "sidra_pipeline";
const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Enum representing all metric names used in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    FetchAttempts,
    FetchFailures,
    FetchPayloadBytes,
    RecordsFetched,
    RowsNormalized,
    SentinelRowsDropped,
    ValuesCoercedToMissing,
    GoldRowsWritten,
    StageDuration,
    StageFailures,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchAttempts => "sidra_fetch_attempts_total",
            MetricName::FetchFailures => "sidra_fetch_failures_total",
            MetricName::FetchPayloadBytes => "sidra_fetch_payload_bytes",
            MetricName::RecordsFetched => "sidra_records_fetched_total",
            MetricName::RowsNormalized => "sidra_rows_normalized_total",
            MetricName::SentinelRowsDropped => "sidra_sentinel_rows_dropped_total",
            MetricName::ValuesCoercedToMissing => "sidra_values_coerced_to_missing_total",
            MetricName::GoldRowsWritten => "sidra_gold_rows_written_total",
            MetricName::StageDuration => "sidra_stage_duration_seconds",
            MetricName::StageFailures => "sidra_stage_failures_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static HANDLE: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

/// Install the Prometheus recorder once per process.
///
/// Returns `None` when another recorder was already installed; the facade
/// calls below are then no-ops for this crate.
pub fn init_metrics() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                debug!("Metrics recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

pub mod fetch {
    use super::MetricName;

    pub fn attempt() {
        ::metrics::counter!(MetricName::FetchAttempts.as_str()).increment(1);
    }

    pub fn failure() {
        ::metrics::counter!(MetricName::FetchFailures.as_str()).increment(1);
    }

    pub fn payload(bytes: usize, records: usize) {
        ::metrics::histogram!(MetricName::FetchPayloadBytes.as_str()).record(bytes as f64);
        ::metrics::counter!(MetricName::RecordsFetched.as_str()).increment(records as u64);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn rows(rows: usize) {
        ::metrics::counter!(MetricName::RowsNormalized.as_str()).increment(rows as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn sentinel_dropped(rows: usize) {
        ::metrics::counter!(MetricName::SentinelRowsDropped.as_str()).increment(rows as u64);
    }

    pub fn coerced_to_missing(values: usize) {
        ::metrics::counter!(MetricName::ValuesCoercedToMissing.as_str()).increment(values as u64);
    }

    pub fn gold_rows(table: &'static str, rows: usize) {
        ::metrics::counter!(MetricName::GoldRowsWritten.as_str(), "table" => table)
            .increment(rows as u64);
    }
}

pub mod stage {
    use super::MetricName;

    pub fn duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }

    pub fn failure(stage: &'static str) {
        ::metrics::counter!(MetricName::StageFailures.as_str(), "stage" => stage).increment(1);
    }
}

/// Push the rendered registry to the Pushgateway, if one is configured.
///
/// Returns `Ok(false)` when `SIDRA_PUSHGATEWAY_URL` is unset or no recorder
/// is installed.
pub async fn push_to_gateway(
    handle: Option<&PrometheusHandle>,
    instance: &str,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let Ok(base) = std::env::var(PUSHGATEWAY_ENV) else {
        return Ok(false);
    };
    let Some(handle) = handle else {
        return Ok(false);
    };

    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        base.trim_end_matches('/'),
        PUSH_JOB,
        instance
    );
    let client = reqwest::Client::builder().timeout(PUSH_TIMEOUT).build()?;
    let response = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(handle.render())
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Pushgateway returned status {}: {}", status, body).into());
    }

    info!("Pushed metrics to Pushgateway for instance={}", instance);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_prometheus_conventions() {
        for name in [
            MetricName::FetchAttempts,
            MetricName::RecordsFetched,
            MetricName::SentinelRowsDropped,
            MetricName::StageFailures,
        ] {
            assert!(name.as_str().starts_with("sidra_"));
            assert!(name.as_str().ends_with("_total"));
        }
        assert_eq!(MetricName::StageDuration.to_string(), "sidra_stage_duration_seconds");
    }

    #[test]
    fn init_is_idempotent() {
        let first = init_metrics().is_some();
        let second = init_metrics().is_some();
        assert_eq!(first, second);
    }
}
