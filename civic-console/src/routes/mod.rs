use metrics::counter;

use civic_shared::errors::AppResult;

use crate::models::{Report, ReportPatch};
use crate::AppState;

pub mod dashboard;
pub mod health;
pub mod queue;
pub mod reports;
pub mod resolved;

/// Merges a patch whose backend write already succeeded and returns the
/// updated local copy.
async fn commit_local(state: &AppState, report_id: &str, patch: &ReportPatch, action: &'static str) -> AppResult<Report> {
    let mut store = state.store.write().await;
    store.apply_local_update(report_id, patch)?;
    counter!("report_transitions_total", "action" => action).increment(1);
    tracing::info!(report_id = %report_id, action, "report updated");
    Ok(store.get(report_id)?.clone())
}
