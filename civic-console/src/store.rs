use chrono::{DateTime, Utc};

use civic_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Report, ReportPatch};

/// Last-fetched report collection for a console session.
///
/// Views read snapshots; the only writers are `refresh` (whole collection)
/// and `apply_local_update` (one report, after its backend write succeeded).
#[derive(Debug, Default)]
pub struct ReportStore {
    reports: Vec<Report>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, fetched: Vec<Report>, now: DateTime<Utc>) {
        let malformed = fetched.iter().filter(|r| !r.is_well_formed()).count();
        if malformed > 0 {
            tracing::warn!(malformed, "reports without coordinates or with unknown status kept out of map views");
        }
        self.reports = fetched;
        self.refreshed_at = Some(now);
    }

    pub fn apply_local_update(&mut self, report_id: &str, patch: &ReportPatch) -> AppResult<()> {
        let report = self
            .reports
            .iter_mut()
            .find(|r| r.id == report_id)
            .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, format!("report {report_id} not found")))?;
        patch.apply_to(report);
        Ok(())
    }

    pub fn snapshot(&self) -> &[Report] {
        &self.reports
    }

    pub fn get(&self, report_id: &str) -> AppResult<&Report> {
        self.reports
            .iter()
            .find(|r| r.id == report_id)
            .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, format!("report {report_id} not found")))
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
