use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Category, Report, ReportStatus};

/// Status card counts.
///
/// Queued reports and reports with an unrecognized status are not counted,
/// so `pending + in_progress + resolved == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

pub fn summarize<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Stats {
    reports
        .into_iter()
        .filter(|r| !r.in_queue)
        .fold(Stats::default(), |mut acc, r| {
            match r.status {
                ReportStatus::Pending => acc.pending += 1,
                ReportStatus::InProgress => acc.in_progress += 1,
                ReportStatus::Resolved => acc.resolved += 1,
                ReportStatus::Unrecognized(_) => return acc,
            }
            acc.total += 1;
            acc
        })
}

/// Raw per-category counts. The category string is kept exactly as found,
/// including a missing one (`None`); bucketing is left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts(BTreeMap<Option<String>, usize>);

impl CategoryCounts {
    pub fn get(&self, category: Option<&str>) -> usize {
        self.0
            .get(&category.map(str::to_string))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, usize)> {
        self.0.iter().map(|(k, v)| (k.as_deref(), *v))
    }

    /// Folds unknown and missing categories into `Others`.
    pub fn normalized(&self) -> CategoryCounts {
        let mut out = BTreeMap::new();
        for (category, count) in self.iter() {
            let bucket = crate::models::normalize_category(category).name().to_string();
            *out.entry(Some(bucket)).or_insert(0) += count;
        }
        CategoryCounts(out)
    }
}

pub fn by_category<'a>(reports: impl IntoIterator<Item = &'a Report>) -> CategoryCounts {
    let mut counts = BTreeMap::new();
    for report in reports.into_iter().filter(|r| !r.in_queue) {
        *counts.entry(report.category.clone()).or_insert(0) += 1;
    }
    CategoryCounts(counts)
}

// --- Chart projections ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartBar {
    pub label: &'static str,
    pub value: usize,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSlice {
    pub name: String,
    pub value: usize,
    pub fill: &'static str,
}

pub fn status_bars(stats: &Stats) -> Vec<ChartBar> {
    [
        ("Pending", ReportStatus::Pending, stats.pending),
        ("In Progress", ReportStatus::InProgress, stats.in_progress),
        ("Resolved", ReportStatus::Resolved, stats.resolved),
    ]
    .into_iter()
    .map(|(label, status, value)| ChartBar {
        label,
        value,
        color: status.color(),
    })
    .collect()
}

/// One slice per category. Known categories get their own colour, others
/// cycle through the palette by slice index.
pub fn category_slices(counts: &CategoryCounts) -> Vec<ChartSlice> {
    counts
        .iter()
        .enumerate()
        .map(|(index, (category, value))| {
            let fill = category
                .and_then(Category::from_name)
                .unwrap_or(Category::ALL[index % Category::ALL.len()])
                .color();
            ChartSlice {
                name: category.unwrap_or("Uncategorized").to_string(),
                value,
                fill,
            }
        })
        .collect()
}
