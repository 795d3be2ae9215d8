use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;
use metrics::counter;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use civic_shared::clients::reports_api::ReportsApiClient;
use civic_shared::errors::{AppError, AppResult, ErrorCode};
use civic_shared::middleware::metrics_middleware;

pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use config::AppConfig;
use models::Report;
use services::aggregation::{summarize, Stats};
use services::workflow::{countdowns, RetentionInterval};
use store::ReportStore;

pub struct AppState {
    pub config: AppConfig,
    pub api: ReportsApiClient,
    pub store: RwLock<ReportStore>,
    pub retention: RetentionInterval,
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
    in_flight: Mutex<HashSet<String>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        api: ReportsApiClient,
        metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let retention = config.retention()?;
        Ok(Self {
            config,
            api,
            store: RwLock::new(ReportStore::new()),
            retention,
            metrics_handle,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Marks a write for `report_id` as in flight until the guard drops.
    /// A second write for the same report is rejected instead of queued.
    pub fn begin_write(&self, report_id: &str) -> AppResult<InFlightGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| AppError::internal("in-flight registry poisoned"))?;
        if !in_flight.insert(report_id.to_string()) {
            return Err(AppError::new(
                ErrorCode::WriteInFlight,
                format!("a write for report {report_id} is already in progress"),
            ));
        }
        Ok(InFlightGuard {
            registry: &self.in_flight,
            report_id: report_id.to_string(),
        })
    }
}

pub struct InFlightGuard<'a> {
    registry: &'a Mutex<HashSet<String>>,
    report_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.registry.lock() {
            in_flight.remove(&self.report_id);
        }
    }
}

/// Replaces the store contents with a fresh fetch. On failure the previous
/// collection is kept and the error is returned as-is.
pub async fn refresh_store(state: &AppState) -> AppResult<Stats> {
    let fetched = match state.api.fetch_reports::<Report>().await {
        Ok(fetched) => fetched,
        Err(e) => {
            counter!("report_refresh_total", "outcome" => "failure").increment(1);
            return Err(e);
        }
    };

    let mut store = state.store.write().await;
    store.refresh(fetched, Utc::now());
    let stats = summarize(store.snapshot());
    counter!("report_refresh_total", "outcome" => "success").increment(1);
    tracing::info!(
        reports = store.len(),
        total = stats.total,
        pending = stats.pending,
        in_progress = stats.in_progress,
        resolved = stats.resolved,
        "report collection refreshed"
    );
    Ok(stats)
}

/// Fetches once if this session has never loaded the collection.
pub async fn ensure_loaded(state: &AppState) -> AppResult<()> {
    if state.store.read().await.refreshed_at().is_none() {
        refresh_store(state).await?;
    }
    Ok(())
}

/// Periodically re-fetches the collection and logs queued reports whose
/// deletion window has passed. Never deletes anything itself.
pub fn spawn_refresh_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.refresh_interval());

        loop {
            interval.tick().await;

            if let Err(e) = refresh_store(&state).await {
                tracing::error!(error = %e, "background refresh failed");
                continue;
            }

            let store = state.store.read().await;
            let expired = countdowns(store.snapshot(), Utc::now())
                .iter()
                .filter(|c| c.expired)
                .count();
            if expired > 0 {
                tracing::info!(expired, "queued reports past their scheduled deletion");
            }
        }
    });
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .route("/reports", get(routes::reports::list_reports))
        .route("/reports/refresh", post(routes::reports::refresh_reports))
        .route("/reports/:id/status", put(routes::reports::update_status))
        .route("/resolved", get(routes::resolved::list_resolved))
        .route("/resolved/:id/solution-image", put(routes::resolved::upload_solution_image))
        .route("/resolved/:id/queue", post(routes::resolved::queue_report))
        .route("/queue", get(routes::queue::list_queue))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
