use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use civic_shared::errors::AppResult;
use civic_shared::types::api::ApiResponse;

use crate::models::{Report, ReportStatus};
use crate::services::aggregation::{by_category, category_slices, status_bars, summarize, ChartBar, ChartSlice, Stats};
use crate::services::filter::{self, ReportQuery, SortOrder};
use crate::services::workflow::{transition, Action};
use crate::{ensure_loaded, refresh_store, AppState};

// --- Request / Response types ---

#[derive(Debug, Default, Deserialize)]
pub struct ReportListParams {
    pub status: Option<String>,
    pub search: Option<String>,
    pub time: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

impl ReportListParams {
    fn query(&self) -> AppResult<ReportQuery> {
        let mut query = ReportQuery::default().with_search(self.search.clone().unwrap_or_default());
        if let Some(status) = &self.status {
            query.status = status.parse()?;
        }
        if let Some(time) = &self.time {
            query.time_window = time.parse()?;
        }
        if let Some(category) = &self.category {
            query.category = category.parse()?;
        }
        Ok(query)
    }

    fn sort_order(&self) -> AppResult<SortOrder> {
        self.sort.as_deref().map_or(Ok(SortOrder::Newest), |sort| sort.parse())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListView {
    pub reports: Vec<Report>,
    pub stats: Stats,
    pub status_bars: Vec<ChartBar>,
    pub category_slices: Vec<ChartSlice>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// --- List reports (filtered, sorted) ---

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportListParams>,
) -> AppResult<Json<ApiResponse<ReportListView>>> {
    let query = params.query()?;
    let order = params.sort_order()?;
    ensure_loaded(&state).await?;

    let store = state.store.read().await;
    let matched = filter::filter(store.snapshot(), &query, Utc::now());
    let stats = summarize(matched.iter().copied());

    Ok(Json(ApiResponse::ok(ReportListView {
        category_slices: category_slices(&by_category(matched.iter().copied())),
        status_bars: status_bars(&stats),
        stats,
        reports: filter::sort(&matched, order).into_iter().cloned().collect(),
    })))
}

// --- Refresh ---

pub async fn refresh_reports(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Stats>>> {
    let stats = refresh_store(&state).await?;
    Ok(Json(ApiResponse::ok_with_message(stats, "reports refreshed")))
}

// --- Status change ---

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Report>>> {
    ensure_loaded(&state).await?;
    let _write = state.begin_write(&report_id)?;

    let status = ReportStatus::from(body.status);
    let action = Action::SetStatus(status.clone());
    let action_name = action.name();
    let patch = {
        let store = state.store.read().await;
        transition(store.get(&report_id)?, action, Utc::now())?
    };

    state.api.update_status(&report_id, status.as_str()).await?;

    let report = super::commit_local(&state, &report_id, &patch, action_name).await?;
    Ok(Json(ApiResponse::ok_with_message(report, "status updated")))
}
