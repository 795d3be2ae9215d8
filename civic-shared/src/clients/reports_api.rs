use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::types::{HealthCheck, HealthStatus, ReportsEnvelope, WriteAck};

/// HTTP client for the upstream reports backend.
///
/// Every call is attempted exactly once. Transport errors, non-2xx responses
/// and undecodable bodies surface as `FetchFailure` for reads and
/// `WriteFailure` for writes.
#[derive(Clone)]
pub struct ReportsApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
}

impl ReportsApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build http client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_reports<T: DeserializeOwned>(&self) -> AppResult<Vec<T>> {
        let url = format!("{}/auth/posts", self.base_url);

        let response = self.client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::fetch_failure(format!("reports backend unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::fetch_failure(format!(
                "reports backend returned status {}",
                response.status()
            )));
        }

        let envelope = response
            .json::<ReportsEnvelope<serde_json::Value>>()
            .await
            .map_err(|e| AppError::fetch_failure(format!("unexpected reports payload: {e}")))?;

        // one undecodable record must not cost the rest of the collection
        let mut reports = Vec::new();
        for raw in envelope.into_reports() {
            match serde_json::from_value::<T>(raw) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable report record"),
            }
        }
        tracing::debug!(count = reports.len(), "reports fetched");
        Ok(reports)
    }

    pub async fn update_status(&self, report_id: &str, status: &str) -> AppResult<()> {
        let url = format!("{}/auth/posts/{report_id}", self.base_url);

        let response = self.client
            .put(&url)
            .json(&StatusUpdate { status })
            .send()
            .await
            .map_err(|e| AppError::write_failure(format!("status update failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::write_failure(format!(
                "status update rejected with status {}",
                response.status()
            )));
        }

        tracing::debug!(report_id = %report_id, status = %status, "status updated upstream");
        Ok(())
    }

    /// Queue writes are acknowledged in the body; a falsy or missing
    /// `success` flag is a failure even on a 2xx response.
    pub async fn queue_for_deletion<P: Serialize>(&self, report_id: &str, schedule: &P) -> AppResult<()> {
        let url = format!("{}/admin/posts/{report_id}", self.base_url);

        let response = self.client
            .put(&url)
            .json(schedule)
            .send()
            .await
            .map_err(|e| AppError::write_failure(format!("queue request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::write_failure(format!(
                "queue request rejected with status {}",
                response.status()
            )));
        }

        let ack = response.json::<WriteAck>().await.unwrap_or_default();
        if !ack.is_success() {
            let message = ack
                .message
                .unwrap_or_else(|| "failed to queue report for deletion".to_string());
            return Err(AppError::write_failure(message));
        }

        tracing::debug!(report_id = %report_id, "report queued upstream");
        Ok(())
    }

    pub async fn attach_solution_image<P: Serialize>(&self, report_id: &str, upload: &P) -> AppResult<()> {
        let url = format!("{}/auth/posts/{report_id}/solution-image", self.base_url);

        let response = self.client
            .put(&url)
            .json(upload)
            .send()
            .await
            .map_err(|e| AppError::write_failure(format!("solution image upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::write_failure(format!(
                "solution image upload rejected with status {}",
                response.status()
            )));
        }

        tracing::debug!(report_id = %report_id, "solution image stored upstream");
        Ok(())
    }

    pub async fn health(&self) -> HealthCheck {
        let url = format!("{}/auth/posts", self.base_url);
        match self.client.head(&url).timeout(Duration::from_secs(3)).send().await {
            Ok(resp) if resp.status().is_success() => HealthCheck {
                name: "reports-backend".to_string(),
                status: HealthStatus::Healthy,
                message: None,
            },
            Ok(resp) => HealthCheck {
                name: "reports-backend".to_string(),
                status: HealthStatus::Degraded,
                message: Some(format!("status {}", resp.status())),
            },
            Err(e) => HealthCheck {
                name: "reports-backend".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(format!("{e}")),
            },
        }
    }
}
