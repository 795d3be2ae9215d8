use std::sync::Arc;

use civic_console::config::AppConfig;
use civic_console::{router, spawn_refresh_task, AppState};
use civic_shared::clients::reports_api::ReportsApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    civic_shared::middleware::init_tracing("civic-console");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = civic_shared::middleware::init_metrics()?;
    let api = ReportsApiClient::new(&config.backend_url, config.request_timeout())?;

    let state = Arc::new(AppState::new(config, api, Some(metrics_handle))?);

    spawn_refresh_task(state.clone());

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "civic-console starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
