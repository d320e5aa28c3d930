use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::RosterServiceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub result_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub cancel_requested: bool,
}

/// Persistence for solve jobs: a FIFO queue, per-job metadata, and the
/// result bodies with their TTL.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates the job record, stores the input payload, and pushes the job
    /// id onto the FIFO queue.
    async fn enqueue(
        &self,
        input: serde_json::Value,
        webhook_url: Option<String>,
    ) -> Result<JobRecord, RosterServiceError>;

    /// Pops the next job id, waiting up to `timeout_seconds`.
    async fn next_job(&self, timeout_seconds: u64) -> Result<Option<String>, RosterServiceError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, RosterServiceError>;

    async fn get_input(&self, job_id: &str)
    -> Result<Option<serde_json::Value>, RosterServiceError>;

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), RosterServiceError>;

    /// Stores the result body with the configured TTL and records its size.
    async fn store_result(
        &self,
        job_id: &str,
        result: serde_json::Value,
        ttl_seconds: u64,
    ) -> Result<(), RosterServiceError>;

    async fn get_result(
        &self,
        job_id: &str,
    ) -> Result<Option<serde_json::Value>, RosterServiceError>;

    /// Flags a job for cancellation; returns false for unknown jobs.
    async fn request_cancel(&self, job_id: &str) -> Result<bool, RosterServiceError>;

    /// Marks completed/failed jobs whose TTL has elapsed as expired.
    /// Returns the number of jobs transitioned.
    async fn cleanup_expired(&self, ttl_seconds: u64) -> Result<usize, RosterServiceError>;
}
