//! Prometheus metrics exposition
//!
//! - `gateway_requests_total` (counter): labels `method`, `path`, `status`
//! - `gateway_request_duration_seconds` (histogram): labels `path`, `status`
//! - `export_jobs_total` (counter): labels `flavor`, `outcome`
//! - `export_duration_seconds` (histogram): label `flavor`
//! - `export_poll_attempts` (histogram): recorded by the export poller
//! - `upstream_errors_total` (counter): label `operation`

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

const POLL_ATTEMPT_BUCKETS: &[f64] = &[1.0, 2.0, 3.0, 5.0, 10.0, 15.0, 20.0];

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures the duration metrics with explicit buckets so they render as
/// Prometheus histograms (with `_bucket` lines for `histogram_quantile()`
/// queries) rather than the default summary. Boundaries cover 5ms to 60s;
/// an assembly export that burns its full polling budget sits around 20s.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
        .set_buckets_for_metric(
            Matcher::Full("export_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
        .set_buckets_for_metric(
            Matcher::Full("export_poll_attempts".to_string()),
            POLL_ATTEMPT_BUCKETS,
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Middleware recording one counter increment and one duration sample per
/// request. Uses the matched route template (`/download/{docId}` style) as
/// the path label so label cardinality stays bounded.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "gateway_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "path" => path,
        "status" => status
    )
    .record(started.elapsed().as_secs_f64());

    response
}

/// Record a finished export job with flavor and outcome labels.
pub fn record_export(flavor: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "export_jobs_total",
        "flavor" => flavor.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("export_duration_seconds", "flavor" => flavor.to_string())
        .record(duration_secs);
}

/// Record a provider-side failure with an operation classification label.
pub fn record_upstream_error(operation: &str) {
    metrics::counter!("upstream_errors_total", "operation" => operation.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        record_export("translation", "done", 0.7);
        record_upstream_error("submit");
    }

    /// Create an isolated recorder/handle pair for unit tests.
    /// Uses build_recorder() instead of install_recorder() to avoid the
    /// global recorder singleton constraint — only one global recorder can
    /// exist per process, and install_recorder() panics on a second call.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("gateway_request_duration_seconds".to_string()),
                DURATION_BUCKETS,
            )
            .expect("failed to set histogram buckets")
            .set_buckets_for_metric(
                Matcher::Full("export_duration_seconds".to_string()),
                DURATION_BUCKETS,
            )
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_export_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_export("translation", "done", 0.8);
        record_export("assembly_step", "timed_out", 20.4);

        let output = handle.render();
        assert!(
            output.contains("export_jobs_total"),
            "rendered output must contain export_jobs_total counter"
        );
        assert!(
            output.contains("flavor=\"translation\""),
            "counter must carry flavor label"
        );
        assert!(
            output.contains("outcome=\"done\""),
            "counter must carry outcome label"
        );
        assert!(
            output.contains("flavor=\"assembly_step\""),
            "second flavor label must appear"
        );
        assert!(
            output.contains("outcome=\"timed_out\""),
            "second outcome label must appear"
        );
        assert!(
            output.contains("export_duration_seconds_bucket"),
            "histogram must render _bucket lines for histogram_quantile() queries"
        );
    }

    #[test]
    fn record_upstream_error_increments_counter_with_label() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_upstream_error("submit");
        record_upstream_error("token_exchange");

        let output = handle.render();
        assert!(
            output.contains("upstream_errors_total"),
            "rendered output must contain upstream_errors_total counter"
        );
        assert!(
            output.contains("operation=\"submit\""),
            "operation label must be recorded"
        );
        assert!(
            output.contains("operation=\"token_exchange\""),
            "distinct operation values must appear separately"
        );
    }

    #[test]
    fn duration_buckets_cover_polling_budget() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_export("assembly_step", "done", 12.0);

        let output = handle.render();
        assert!(output.contains("le=\"0.005\""), "5ms bucket must exist");
        assert!(
            output.contains("le=\"30\""),
            "30s bucket must exist (full assembly polling budget fits under it)"
        );
        assert!(
            output.contains("le=\"+Inf\""),
            "+Inf bucket must exist (Prometheus convention)"
        );
    }
}
