use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("http_requests_total", "HTTP responses by status code");
    metrics::describe_histogram!("http_request_duration_seconds", "HTTP request latency");
    metrics::describe_counter!(
        "generation_requests_total",
        "Calls to the generation service by kind and outcome"
    );
    metrics::describe_histogram!(
        "generation_duration_seconds",
        "Generation service call latency by kind"
    );
    metrics::describe_counter!("rate_limited_total", "Generation requests rejected by the rate limiter");
    metrics::describe_counter!("extractions_total", "Gradesheet extractions by parse outcome");
    metrics::describe_counter!(
        "reconciliation_warnings_total",
        "Activity positions whose OCR label disagreed with the curriculum"
    );
    metrics::describe_counter!(
        "batch_reports_mismatch_total",
        "Batch responses that returned fewer reports than students"
    );
    metrics::describe_counter!(
        "learning_summary_jobs_total",
        "Learning-summary queue items by terminal outcome"
    );
}
