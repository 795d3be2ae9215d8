use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use civic_shared::errors::{AppError, AppResult};

use crate::models::{DeletionSchedule, Report, ReportPatch, ReportStatus};
use crate::services::crop::EncodedImage;

/// Time between queuing a report and it becoming eligible for deletion.
/// Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionInterval(Duration);

impl RetentionInterval {
    pub const DEFAULT_SECS: i64 = 7 * 24 * 60 * 60;

    pub fn new(duration: Duration) -> AppResult<Self> {
        if duration <= Duration::zero() {
            return Err(AppError::Validation(
                "retention interval must be strictly positive".to_string(),
            ));
        }
        Ok(Self(duration))
    }

    pub fn from_secs(secs: i64) -> AppResult<Self> {
        let duration = Duration::try_seconds(secs).ok_or_else(|| {
            AppError::Validation(format!("retention interval of {secs}s is out of range"))
        })?;
        Self::new(duration)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl Default for RetentionInterval {
    fn default() -> Self {
        Self(Duration::seconds(Self::DEFAULT_SECS))
    }
}

/// Where a report sits in the review lifecycle. `QueuedForDeletion` wins over
/// the status field, which keeps whatever value it had when queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportState {
    Pending,
    InProgress,
    Resolved,
    QueuedForDeletion,
    Unrecognized(String),
}

pub fn state_of(report: &Report) -> ReportState {
    if report.in_queue {
        return ReportState::QueuedForDeletion;
    }
    match &report.status {
        ReportStatus::Pending => ReportState::Pending,
        ReportStatus::InProgress => ReportState::InProgress,
        ReportStatus::Resolved => ReportState::Resolved,
        ReportStatus::Unrecognized(raw) => ReportState::Unrecognized(raw.clone()),
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    SetStatus(ReportStatus),
    QueueForDeletion { retention: RetentionInterval },
    AttachSolutionImage(EncodedImage),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetStatus(_) => "set_status",
            Self::QueueForDeletion { .. } => "queue_for_deletion",
            Self::AttachSolutionImage(_) => "attach_solution_image",
        }
    }
}

/// Every lifecycle change goes through here.
///
/// Returns the patch describing the change without touching `report`; the
/// caller writes it to the backend and only then merges it locally.
pub fn transition(report: &Report, action: Action, now: DateTime<Utc>) -> AppResult<ReportPatch> {
    let state = state_of(report);

    let patch = match action {
        Action::SetStatus(status) => {
            if state == ReportState::QueuedForDeletion {
                return Err(AppError::precondition_failed(
                    "report is queued for deletion and its status can no longer change",
                ));
            }
            if !status.is_known() {
                return Err(AppError::Validation(format!(
                    "'{status}' is not a valid report status"
                )));
            }
            ReportPatch {
                status: Some(status),
                ..Default::default()
            }
        }
        Action::QueueForDeletion { retention } => {
            if state != ReportState::Resolved {
                return Err(AppError::precondition_failed(
                    "only resolved reports that are not already queued can be queued for deletion",
                ));
            }
            if !report.has_solution_image() {
                return Err(AppError::precondition_failed(
                    "a solution image must be attached before queuing for deletion",
                ));
            }
            let scheduled_deletion = now.checked_add_signed(retention.duration()).ok_or_else(|| {
                AppError::Validation("scheduled deletion falls outside the representable time range".to_string())
            })?;
            ReportPatch {
                schedule: Some(DeletionSchedule {
                    in_queue: true,
                    queued_at: now,
                    scheduled_deletion,
                }),
                ..Default::default()
            }
        }
        Action::AttachSolutionImage(image) => {
            can_attach_solution_image(report)?;
            ReportPatch {
                solution_image: Some(image.data_url),
                ..Default::default()
            }
        }
    };

    tracing::debug!(report_id = %report.id, from = ?state, "transition accepted");
    Ok(patch)
}

/// Attach precondition on its own, so callers can reject before paying for
/// an encode. A solution image is attached at most once.
pub fn can_attach_solution_image(report: &Report) -> AppResult<()> {
    if state_of(report) != ReportState::Resolved {
        return Err(AppError::precondition_failed(
            "solution images can only be attached to resolved reports outside the deletion queue",
        ));
    }
    if report.has_solution_image() {
        return Err(AppError::precondition_failed(
            "a solution image is already attached to this report",
        ));
    }
    Ok(())
}

// --- Countdown ---

/// Remaining time before a queued report becomes eligible for deletion,
/// truncated to whole minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl std::fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d {}h {}m", self.days, self.hours, self.minutes)
    }
}

/// Advisory only. Clamped at zero once the scheduled instant has passed.
pub fn time_remaining(scheduled_deletion: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    let left = (scheduled_deletion - now).max(Duration::zero());
    TimeRemaining {
        days: left.num_days(),
        hours: left.num_hours() % 24,
        minutes: left.num_minutes() % 60,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown<'a> {
    pub report: &'a Report,
    pub remaining: TimeRemaining,
    pub display: String,
    pub expired: bool,
}

/// Pairs every queued report with its remaining time. A report is expired
/// once its scheduled instant is reached; one without a schedule always is.
pub fn countdowns(reports: &[Report], now: DateTime<Utc>) -> Vec<Countdown<'_>> {
    reports
        .iter()
        .filter(|r| r.in_queue)
        .map(|report| {
            let remaining = report
                .scheduled_deletion
                .map(|at| time_remaining(at, now))
                .unwrap_or_default();
            Countdown {
                report,
                remaining,
                display: remaining.to_string(),
                expired: report.scheduled_deletion.map_or(true, |at| at <= now),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_shared::errors::ErrorCode;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn resolved(solution: bool) -> Report {
        Report {
            id: "r1".into(),
            status: ReportStatus::Resolved,
            solution_image: solution.then(|| "data:image/jpeg;base64,AAAA".to_string()),
            ..Default::default()
        }
    }

    fn image() -> EncodedImage {
        EncodedImage {
            data_url: "data:image/jpeg;base64,BBBB".into(),
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn queue_without_solution_image_is_rejected() {
        let report = resolved(false);
        let err = transition(
            &report,
            Action::QueueForDeletion { retention: RetentionInterval::default() },
            now(),
        )
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
        assert!(!report.in_queue);
    }

    #[test]
    fn queue_with_solution_image_schedules_deletion() {
        let retention = RetentionInterval::from_secs(180).unwrap();
        let mut report = resolved(true);
        let patch = transition(&report, Action::QueueForDeletion { retention }, now()).unwrap();
        patch.apply_to(&mut report);

        assert!(report.in_queue);
        assert_eq!(report.status, ReportStatus::Resolved);
        let queued_at = report.queued_at.unwrap();
        let scheduled = report.scheduled_deletion.unwrap();
        assert_eq!(queued_at, now());
        assert_eq!(scheduled - queued_at, retention.duration());
        assert_eq!(state_of(&report), ReportState::QueuedForDeletion);
    }

    #[test]
    fn queue_requires_resolved_status() {
        let report = Report {
            status: ReportStatus::InProgress,
            ..resolved(true)
        };
        let err = transition(
            &report,
            Action::QueueForDeletion { retention: RetentionInterval::default() },
            now(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn status_moves_freely_in_both_directions() {
        let mut report = Report {
            status: ReportStatus::Pending,
            ..Default::default()
        };
        for target in [
            ReportStatus::InProgress,
            ReportStatus::Resolved,
            ReportStatus::Pending,
            ReportStatus::Resolved,
        ] {
            transition(&report, Action::SetStatus(target.clone()), now())
                .unwrap()
                .apply_to(&mut report);
            assert_eq!(report.status, target);
            assert!(!report.in_queue);
        }
    }

    #[test]
    fn nothing_leaves_the_queue() {
        let mut report = resolved(true);
        report.in_queue = true;

        let err = transition(&report, Action::SetStatus(ReportStatus::Pending), now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);

        let err = transition(&report, Action::AttachSolutionImage(image()), now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);

        let err = transition(
            &report,
            Action::QueueForDeletion { retention: RetentionInterval::default() },
            now(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn unknown_target_status_is_invalid() {
        let report = resolved(false);
        let err = transition(
            &report,
            Action::SetStatus(ReportStatus::Unrecognized("closed".into())),
            now(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn solution_image_only_on_resolved() {
        let pending = Report {
            status: ReportStatus::Pending,
            ..Default::default()
        };
        assert!(transition(&pending, Action::AttachSolutionImage(image()), now()).is_err());

        let patch = transition(&resolved(false), Action::AttachSolutionImage(image()), now()).unwrap();
        assert_eq!(patch.solution_image.as_deref(), Some("data:image/jpeg;base64,BBBB"));
        assert!(patch.status.is_none());
    }

    #[test]
    fn last_minute_is_not_expired() {
        let mut report = resolved(true);
        report.in_queue = true;
        report.scheduled_deletion = Some(now() + Duration::seconds(30));
        let reports = vec![report];

        let rows = countdowns(&reports, now());
        assert_eq!(rows[0].display, "0d 0h 0m");
        assert!(!rows[0].expired);

        let rows = countdowns(&reports, now() + Duration::seconds(30));
        assert!(rows[0].expired);
    }

    #[test]
    fn out_of_range_retention_is_rejected() {
        let err = RetentionInterval::from_secs(i64::MAX).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn schedule_overflow_is_validation_error() {
        let retention = RetentionInterval::from_secs(1_000_000_000_000_000).unwrap();
        let err = transition(&resolved(true), Action::QueueForDeletion { retention }, now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn solution_image_is_attached_once() {
        let err = transition(&resolved(true), Action::AttachSolutionImage(image()), now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
        assert!(can_attach_solution_image(&resolved(false)).is_ok());
    }

    #[test]
    fn retention_must_be_positive() {
        assert!(RetentionInterval::from_secs(0).is_err());
        assert!(RetentionInterval::from_secs(-5).is_err());
        assert_eq!(
            RetentionInterval::default().duration(),
            Duration::days(7)
        );
    }

    #[test]
    fn remaining_time_decomposes() {
        let scheduled = now() + Duration::days(2) + Duration::hours(5) + Duration::minutes(7) + Duration::seconds(59);
        let left = time_remaining(scheduled, now());
        assert_eq!(left, TimeRemaining { days: 2, hours: 5, minutes: 7 });
        assert_eq!(left.to_string(), "2d 5h 7m");
    }

    #[test]
    fn remaining_time_clamps_at_zero() {
        let left = time_remaining(now() - Duration::hours(3), now());
        assert_eq!(left, TimeRemaining::default());
        assert_eq!(left.to_string(), "0d 0h 0m");
    }

    #[test]
    fn countdowns_cover_only_queued() {
        let mut queued = resolved(true);
        queued.in_queue = true;
        queued.scheduled_deletion = Some(now() + Duration::minutes(3));
        let mut unscheduled = resolved(true);
        unscheduled.id = "r2".into();
        unscheduled.in_queue = true;
        let reports = vec![queued, unscheduled, resolved(false)];

        let rows = countdowns(&reports, now());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display, "0d 0h 3m");
        assert!(!rows[0].expired);
        assert!(rows[1].expired);
    }
}
