use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use civic_shared::errors::AppResult;
use civic_shared::types::api::ApiResponse;

use crate::services::aggregation::{status_bars, summarize, ChartBar, Stats};
use crate::services::filter::{map_points, map_viewport, MapPoint, MapViewport};
use crate::{ensure_loaded, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub stats: Stats,
    pub status_bars: Vec<ChartBar>,
    pub map_points: Vec<MapPoint>,
    pub viewport: MapViewport,
}

pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<DashboardView>>> {
    ensure_loaded(&state).await?;

    let store = state.store.read().await;
    let reports = store.snapshot();
    let stats = summarize(reports);

    Ok(Json(ApiResponse::ok(DashboardView {
        stats,
        status_bars: status_bars(&stats),
        map_points: map_points(reports),
        viewport: map_viewport(reports),
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use crate::models::{Location, Report, ReportStatus};
    use crate::test_support::{call, get as get_request, state_with};
    use crate::AppState;

    fn located(id: &str, status: ReportStatus, in_queue: bool) -> Report {
        Report {
            id: id.into(),
            status,
            in_queue,
            location: Some(Location {
                latitude: Some(12.97),
                longitude: Some(77.59),
                address: None,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn dashboard_counts_exclude_queue() {
        let state = state_with(
            vec![
                located("a", ReportStatus::Pending, false),
                located("b", ReportStatus::Resolved, false),
                located("c", ReportStatus::Resolved, true),
            ],
            Router::new(),
        )
        .await;

        let (status, body) = call(state, get_request("/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["stats"], json!({ "total": 2, "pending": 1, "inProgress": 0, "resolved": 1 }));
        assert_eq!(data["statusBars"].as_array().unwrap().len(), 3);
        assert_eq!(data["mapPoints"].as_array().unwrap().len(), 2);
        assert_eq!(data["viewport"]["zoom"], 12);
    }

    #[tokio::test]
    async fn first_view_loads_from_backend() {
        let api = crate::test_support::spawn_backend(Router::new().route(
            "/auth/posts",
            get(|| async { Json(json!([{ "_id": "x", "status": "in-progress" }])) }),
        ))
        .await;
        let state = std::sync::Arc::new(AppState::new(Default::default(), api, None).unwrap());

        let (status, body) = call(state, get_request("/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stats"]["inProgress"], 1);
        assert_eq!(body["data"]["viewport"]["zoom"], 5);
    }

    #[tokio::test]
    async fn unreachable_backend_on_first_load_is_bad_gateway() {
        let api = crate::test_support::spawn_backend(Router::new()).await;
        let state = std::sync::Arc::new(AppState::new(Default::default(), api, None).unwrap());

        let (status, body) = call(state, get_request("/dashboard")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "E1001");
    }
}
