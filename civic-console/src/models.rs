use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// --- Status ---

/// Administrative status of a report.
///
/// Parsed leniently: a status string the console does not know is kept as
/// `Unrecognized` so the report stays in the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Unrecognized(String),
}

impl ReportStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Pending => "#F97316",
            Self::InProgress => "#3B82F6",
            Self::Resolved => "#22C55E",
            Self::Unrecognized(_) => "#6B7280",
        }
    }
}

impl From<String> for ReportStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => Self::Pending,
            "in-progress" => Self::InProgress,
            "resolved" => Self::Resolved,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<ReportStatus> for String {
    fn from(status: ReportStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Missing key defaults to `Pending`; an explicit `null` or a non-string
/// value is kept as `Unrecognized`.
fn lenient_status<'de, D>(deserializer: D) -> Result<ReportStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(raw) => ReportStatus::from(raw),
        other => ReportStatus::Unrecognized(other.to_string()),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Category ---

/// Known categories. Only used for display colouring and opt-in bucketing;
/// report categories themselves are free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Water,
    Roads,
    Landslides,
    Electricity,
    Sanitation,
    Others,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Water,
        Category::Roads,
        Category::Landslides,
        Category::Electricity,
        Category::Sanitation,
        Category::Others,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Water => "Water",
            Self::Roads => "Roads",
            Self::Landslides => "Landslides",
            Self::Electricity => "Electricity",
            Self::Sanitation => "Sanitation",
            Self::Others => "Others",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Water => "#3498DB",
            Self::Roads => "#E74C3C",
            Self::Landslides => "#F39C12",
            Self::Electricity => "#9B59B6",
            Self::Sanitation => "#2ECC71",
            Self::Others => "#34495E",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Explicit bucketing policy: known names pass through, anything else
/// (including a missing category) becomes `Others`.
pub fn normalize_category(category: Option<&str>) -> Category {
    category.and_then(Category::from_name).unwrap_or(Category::Others)
}

// --- Report ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, alias = "SolutionImage", skip_serializing_if = "Option::is_none")]
    pub solution_image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub in_queue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_deletion: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let location = self.location.as_ref()?;
        Some((location.latitude?, location.longitude?))
    }

    /// Usable for map-bound views: has an id, both coordinates and a known status.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && self.coordinates().is_some() && self.status.is_known()
    }

    pub fn has_solution_image(&self) -> bool {
        self.solution_image.is_some()
    }
}

// --- Write payloads ---

/// Body of the queue-for-deletion write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSchedule {
    pub in_queue: bool,
    pub queued_at: DateTime<Utc>,
    pub scheduled_deletion: DateTime<Utc>,
}

/// Body of the solution-image write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionImageUpload {
    pub solution_image: String,
    pub original_width: u32,
    pub original_height: u32,
}

/// Field-level update produced by the workflow and merged into the local copy
/// after the matching backend write succeeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPatch {
    pub status: Option<ReportStatus>,
    pub schedule: Option<DeletionSchedule>,
    pub solution_image: Option<String>,
}

impl ReportPatch {
    pub fn apply_to(&self, report: &mut Report) {
        if let Some(status) = &self.status {
            report.status = status.clone();
        }
        if let Some(schedule) = &self.schedule {
            report.in_queue = schedule.in_queue;
            report.queued_at = Some(schedule.queued_at);
            report.scheduled_deletion = Some(schedule.scheduled_deletion);
        }
        if let Some(image) = &self.solution_image {
            report.solution_image = Some(image.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_backend_shape() {
        let report: Report = serde_json::from_str(
            r#"{
                "_id": "65f0c1",
                "title": "Pothole on Main St",
                "description": "Deep pothole",
                "category": "Roads",
                "status": "in-progress",
                "location": { "latitude": 27.7, "longitude": 85.3, "address": "Main St" },
                "SolutionImage": "data:image/jpeg;base64,AAAA",
                "inQueue": false,
                "createdAt": "2024-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(report.id, "65f0c1");
        assert_eq!(report.status, ReportStatus::InProgress);
        assert_eq!(report.coordinates(), Some((27.7, 85.3)));
        assert!(report.has_solution_image());
        assert_eq!(report.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        assert!(report.is_well_formed());
    }

    #[test]
    fn null_fields_do_not_drop_the_collection() {
        let envelope: civic_shared::types::api::ReportsEnvelope<Report> = serde_json::from_str(
            r#"{"posts":[
                {"_id":"a","status":"pending"},
                {"_id":"b","status":null,"title":null,"description":null,"inQueue":null,"createdAt":null},
                {"_id":"c","status":3}
            ]}"#,
        )
        .unwrap();
        let reports = envelope.into_reports();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].status, ReportStatus::Pending);
        assert_eq!(reports[1].status, ReportStatus::Unrecognized("null".into()));
        assert_eq!(reports[1].title, "");
        assert!(!reports[1].in_queue);
        assert_eq!(reports[1].created_at, DateTime::<Utc>::default());
        assert_eq!(reports[2].status, ReportStatus::Unrecognized("3".into()));
    }

    #[test]
    fn missing_status_defaults_to_pending() {
        let report: Report = serde_json::from_str(r#"{"_id":"x"}"#).unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let report: Report =
            serde_json::from_str(r#"{"_id":"x","status":"archived","location":{"latitude":1.0,"longitude":2.0}}"#)
                .unwrap();

        assert_eq!(report.status, ReportStatus::Unrecognized("archived".into()));
        assert!(!report.is_well_formed());
        assert_eq!(serde_json::to_value(&report).unwrap()["status"], "archived");
    }

    #[test]
    fn missing_location_is_not_map_ready() {
        let report: Report = serde_json::from_str(r#"{"_id":"x","status":"pending"}"#).unwrap();
        assert_eq!(report.coordinates(), None);
        assert!(!report.is_well_formed());

        let half: Report =
            serde_json::from_str(r#"{"_id":"y","status":"pending","location":{"latitude":3.0}}"#).unwrap();
        assert_eq!(half.coordinates(), None);
    }

    #[test]
    fn serializes_with_backend_field_names() {
        let report = Report {
            id: "r1".into(),
            status: ReportStatus::Resolved,
            in_queue: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["_id"], "r1");
        assert_eq!(value["inQueue"], true);
        assert_eq!(value["status"], "resolved");
    }

    #[test]
    fn category_bucketing_is_opt_in() {
        assert_eq!(normalize_category(Some("Water")), Category::Water);
        assert_eq!(normalize_category(Some("Potholes")), Category::Others);
        assert_eq!(normalize_category(None), Category::Others);
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let mut report = Report {
            id: "r1".into(),
            title: "Broken pipe".into(),
            status: ReportStatus::Pending,
            ..Default::default()
        };
        ReportPatch {
            status: Some(ReportStatus::Resolved),
            ..Default::default()
        }
        .apply_to(&mut report);

        assert_eq!(report.status, ReportStatus::Resolved);
        assert_eq!(report.title, "Broken pipe");
        assert!(!report.in_queue);
    }
}
