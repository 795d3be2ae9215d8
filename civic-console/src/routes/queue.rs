use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use civic_shared::errors::AppResult;
use civic_shared::types::api::ApiResponse;

use crate::models::Report;
use crate::services::workflow::{countdowns, TimeRemaining};
use crate::{ensure_loaded, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRow {
    #[serde(flatten)]
    pub report: Report,
    pub remaining: TimeRemaining,
    pub countdown: String,
    pub expired: bool,
}

/// Queued reports with the time left before each becomes eligible for
/// deletion. Recomputed on every request.
pub async fn list_queue(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<QueueRow>>>> {
    ensure_loaded(&state).await?;

    let store = state.store.read().await;
    let rows = countdowns(store.snapshot(), Utc::now())
        .into_iter()
        .map(|c| QueueRow {
            report: c.report.clone(),
            remaining: c.remaining,
            countdown: c.display,
            expired: c.expired,
        })
        .collect();

    Ok(Json(ApiResponse::ok(rows)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::Router;
    use chrono::{Duration, Utc};

    use crate::models::{Report, ReportStatus};
    use crate::test_support::{call, get as get_request, state_with};

    #[tokio::test]
    async fn queue_lists_only_queued_with_countdown() {
        let now = Utc::now();
        let reports = vec![
            Report {
                id: "soon".into(),
                status: ReportStatus::Resolved,
                in_queue: true,
                queued_at: Some(now - Duration::days(5)),
                scheduled_deletion: Some(now + Duration::days(2) + Duration::hours(3) + Duration::seconds(30)),
                ..Default::default()
            },
            Report {
                id: "past".into(),
                status: ReportStatus::Resolved,
                in_queue: true,
                scheduled_deletion: Some(now - Duration::hours(1)),
                ..Default::default()
            },
            Report {
                id: "active".into(),
                ..Default::default()
            },
        ];
        let state = state_with(reports, Router::new()).await;

        let (status, body) = call(state, get_request("/queue")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["_id"], "soon");
        assert_eq!(rows[0]["countdown"], "2d 3h 0m");
        assert_eq!(rows[0]["expired"], false);
        assert_eq!(rows[1]["countdown"], "0d 0h 0m");
        assert_eq!(rows[1]["expired"], true);
    }
}
