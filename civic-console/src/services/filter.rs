use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use civic_shared::errors::AppError;

use crate::models::{Report, ReportStatus};

// --- Criteria ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReportStatus),
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        match ReportStatus::from(s.to_string()) {
            ReportStatus::Unrecognized(raw) => Err(AppError::Validation(format!(
                "status filter must be one of all, pending, in-progress, resolved (got '{raw}')"
            ))),
            status => Ok(Self::Only(status)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeWindow {
    #[default]
    All,
    Week,
    Last30Days,
    Last90Days,
}

impl TimeWindow {
    pub fn span(&self) -> Option<Duration> {
        match self {
            Self::All => None,
            Self::Week => Some(Duration::days(7)),
            Self::Last30Days => Some(Duration::days(30)),
            Self::Last90Days => Some(Duration::days(90)),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "week" => Ok(Self::Week),
            "30days" => Ok(Self::Last30Days),
            "90days" => Ok(Self::Last90Days),
            other => Err(AppError::Validation(format!(
                "time window must be one of all, week, 30days, 90days (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl FromStr for CategoryFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "all" => Self::All,
            other => Self::Only(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            other => Err(AppError::Validation(format!(
                "sort order must be newest or oldest (got '{other}')"
            ))),
        }
    }
}

/// Caller-owned view criteria. The default is the standard (non-queue) view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub exclude_queued: bool,
    pub status: StatusFilter,
    pub search_text: String,
    pub time_window: TimeWindow,
    pub category: CategoryFilter,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            exclude_queued: true,
            status: StatusFilter::All,
            search_text: String::new(),
            time_window: TimeWindow::All,
            category: CategoryFilter::All,
        }
    }
}

impl ReportQuery {
    pub fn with_status(mut self, status: ReportStatus) -> Self {
        self.status = StatusFilter::Only(status);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }
}

// --- Filtering ---

/// Selects the reports matching `query`.
///
/// Queued reports are dropped first when `exclude_queued` is set; the other
/// criteria form a plain conjunction over what remains.
pub fn filter<'a>(reports: &'a [Report], query: &ReportQuery, now: DateTime<Utc>) -> Vec<&'a Report> {
    let needle = query.search_text.to_lowercase();
    let cutoff = query.time_window.span().map(|span| now - span);

    reports
        .iter()
        .filter(|r| !(query.exclude_queued && r.in_queue))
        .filter(|r| match &query.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => &r.status == status,
        })
        .filter(|r| needle.is_empty() || r.title.to_lowercase().contains(&needle))
        .filter(|r| cutoff.map_or(true, |cutoff| r.created_at > cutoff))
        .filter(|r| match &query.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => r.category.as_deref() == Some(category.as_str()),
        })
        .collect()
}

/// In-queue view selector.
pub fn queued(reports: &[Report]) -> Vec<&Report> {
    reports.iter().filter(|r| r.in_queue).collect()
}

/// Stable sort by `createdAt`. The input slice is left untouched.
pub fn sort<'a>(reports: &[&'a Report], order: SortOrder) -> Vec<&'a Report> {
    let mut sorted = reports.to_vec();
    match order {
        SortOrder::Newest => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }
    sorted
}

// --- Map projection ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub id: String,
    pub title: String,
    pub status: String,
    pub category: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapViewport {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
}

pub const DEFAULT_VIEWPORT: MapViewport = MapViewport {
    latitude: 20.5937,
    longitude: 78.9629,
    zoom: 5,
};

const FOCUSED_ZOOM: u8 = 12;

/// Markers for every non-queued, well-formed report. Reports without
/// coordinates are skipped here but stay in the collection.
pub fn map_points(reports: &[Report]) -> Vec<MapPoint> {
    reports
        .iter()
        .filter(|r| !r.in_queue && r.is_well_formed())
        .filter_map(|r| {
            let (latitude, longitude) = r.coordinates()?;
            Some(MapPoint {
                id: r.id.clone(),
                title: r.title.clone(),
                status: r.status.to_string(),
                category: r.category.clone(),
                latitude,
                longitude,
                color: r.status.color(),
            })
        })
        .collect()
}

pub fn map_viewport(reports: &[Report]) -> MapViewport {
    reports
        .iter()
        .filter(|r| !r.in_queue)
        .find_map(Report::coordinates)
        .map(|(latitude, longitude)| MapViewport {
            latitude,
            longitude,
            zoom: FOCUSED_ZOOM,
        })
        .unwrap_or(DEFAULT_VIEWPORT)
}
