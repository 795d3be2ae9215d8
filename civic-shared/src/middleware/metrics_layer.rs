use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use std::time::Instant;

/// Coarse result class for a console request. Upstream failures are split
/// out from the console's own errors so backend trouble shows on its own.
pub fn request_outcome(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => "upstream_error",
        StatusCode::CONFLICT => "rejected",
        s if s.is_server_error() => "server_error",
        s if s.is_client_error() => "client_error",
        _ => "ok",
    }
}

pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // all unmatched paths share one label
    let route = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let outcome = request_outcome(response.status());
    counter!(
        "console_view_requests_total",
        "method" => method,
        "route" => route.clone(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("console_view_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());

    response
}

/// Installs the global Prometheus recorder. Fails if a recorder is already installed.
pub fn init_metrics() -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;
    Ok(handle)
}
