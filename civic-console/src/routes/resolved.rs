use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use civic_shared::errors::{AppError, AppResult};
use civic_shared::types::api::ApiResponse;

use crate::models::{Report, ReportStatus};
use crate::services::crop::{CropRect, CropSession, SourceImage};
use crate::services::filter::{self, ReportQuery, SortOrder};
use crate::services::workflow::{can_attach_solution_image, transition, Action};
use crate::{ensure_loaded, AppState};

// --- Request / Response types ---

#[derive(Debug, Default, Deserialize)]
pub struct ResolvedListParams {
    pub search: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRow {
    #[serde(flatten)]
    pub report: Report,
    pub has_solution_image: bool,
}

/// Source image as base64 (or a data URL), the size it was displayed at
/// while cropping, and the completed crop in displayed pixels.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionImageRequest {
    pub image: Option<String>,
    pub displayed_width: f64,
    pub displayed_height: f64,
    pub crop: Option<CropRect>,
}

// --- Resolved list ---

pub async fn list_resolved(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolvedListParams>,
) -> AppResult<Json<ApiResponse<Vec<ResolvedRow>>>> {
    let order = params
        .sort
        .as_deref()
        .map_or(Ok(SortOrder::Oldest), |sort| sort.parse())?;
    let query = ReportQuery::default()
        .with_status(ReportStatus::Resolved)
        .with_search(params.search.unwrap_or_default());
    ensure_loaded(&state).await?;

    let store = state.store.read().await;
    let matched = filter::filter(store.snapshot(), &query, Utc::now());
    let rows = filter::sort(&matched, order)
        .into_iter()
        .map(|report| ResolvedRow {
            has_solution_image: report.has_solution_image(),
            report: report.clone(),
        })
        .collect();

    Ok(Json(ApiResponse::ok(rows)))
}

// --- Solution image ---

pub async fn upload_solution_image(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<String>,
    Json(body): Json<SolutionImageRequest>,
) -> AppResult<Json<ApiResponse<Report>>> {
    ensure_loaded(&state).await?;
    let _write = state.begin_write(&report_id)?;
    can_attach_solution_image(state.store.read().await.get(&report_id)?)?;

    let mut session = CropSession::new();
    if let Some(image) = &body.image {
        session.select_source(SourceImage::from_base64(image, body.displayed_width, body.displayed_height)?);
    }
    if let Some(crop) = body.crop {
        session.complete(crop);
    }
    let encoded = session.encode().await?;
    let upload = encoded.upload();

    let action = Action::AttachSolutionImage(encoded);
    let action_name = action.name();
    let patch = {
        let store = state.store.read().await;
        transition(store.get(&report_id)?, action, Utc::now())?
    };

    state.api.attach_solution_image(&report_id, &upload).await?;

    let report = super::commit_local(&state, &report_id, &patch, action_name).await?;
    Ok(Json(ApiResponse::ok_with_message(report, "solution image uploaded")))
}

// --- Queue for deletion ---

pub async fn queue_report(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<String>,
) -> AppResult<Json<ApiResponse<Report>>> {
    ensure_loaded(&state).await?;
    let _write = state.begin_write(&report_id)?;

    let action = Action::QueueForDeletion { retention: state.retention };
    let action_name = action.name();
    let patch = {
        let store = state.store.read().await;
        transition(store.get(&report_id)?, action, Utc::now())?
    };
    let schedule = patch
        .schedule
        .as_ref()
        .ok_or_else(|| AppError::internal("queue transition produced no schedule"))?;

    state.api.queue_for_deletion(&report_id, schedule).await?;

    let report = super::commit_local(&state, &report_id, &patch, action_name).await?;
    Ok(Json(ApiResponse::ok_with_message(report, "report queued for deletion")))
}
