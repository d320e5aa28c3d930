use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::domain::job::{JobRecord, JobStatus, JobStore};
use crate::error::RosterServiceError;

const KEY_PREFIX: &str = "roster";

/// Redis-backed job store: a FIFO list for the queue, a hash per job for
/// metadata and the input payload, and a TTL'd string per result body.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
}

impl RedisJobStore {
    pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn queue_key() -> String {
        format!("{KEY_PREFIX}:jobs:queue")
    }

    fn job_key(job_id: &str) -> String {
        format!("{KEY_PREFIX}:job:{job_id}")
    }

    fn result_key(job_id: &str) -> String {
        format!("{KEY_PREFIX}:result:{job_id}")
    }

    fn jobs_index_key() -> String {
        format!("{KEY_PREFIX}:jobs:all")
    }

    async fn read_record(
        &self,
        job_id: &str,
    ) -> Result<Option<JobRecord>, RosterServiceError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(Self::job_key(job_id), "record").await?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| RosterServiceError::Internal(format!("corrupt job record: {e}"))),
        }
    }

    async fn write_record(&self, record: &JobRecord) -> Result<(), RosterServiceError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record)
            .map_err(|e| RosterServiceError::Internal(format!("record serialisation: {e}")))?;
        let _: () = conn
            .hset(Self::job_key(&record.job_id), "record", json)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    #[tracing::instrument(skip(self, input))]
    async fn enqueue(
        &self,
        input: serde_json::Value,
        webhook_url: Option<String>,
    ) -> Result<JobRecord, RosterServiceError> {
        let record = JobRecord {
            job_id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            result_available: false,
            result_size_bytes: None,
            webhook_url,
            cancel_requested: false,
        };

        let mut conn = self.conn.clone();
        self.write_record(&record).await?;
        let _: () = conn
            .hset(
                Self::job_key(&record.job_id),
                "input",
                input.to_string(),
            )
            .await?;
        let _: () = conn.sadd(Self::jobs_index_key(), &record.job_id).await?;
        let _: () = conn.rpush(Self::queue_key(), &record.job_id).await?;
        Ok(record)
    }

    async fn next_job(&self, timeout_seconds: u64) -> Result<Option<String>, RosterServiceError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = conn
            .blpop(Self::queue_key(), timeout_seconds as f64)
            .await?;
        Ok(popped.map(|(_, job_id)| job_id))
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, RosterServiceError> {
        self.read_record(job_id).await
    }

    async fn get_input(
        &self,
        job_id: &str,
    ) -> Result<Option<serde_json::Value>, RosterServiceError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(Self::job_key(job_id), "input").await?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| RosterServiceError::Internal(format!("corrupt job input: {e}"))),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), RosterServiceError> {
        let Some(mut record) = self.read_record(job_id).await? else {
            return Err(RosterServiceError::NotFound(format!(
                "job {job_id} not found"
            )));
        };
        record.status = status;
        match status {
            JobStatus::InProgress => record.started_at = Some(Utc::now()),
            _ if status.is_terminal() => record.completed_at = Some(Utc::now()),
            _ => {}
        }
        if error_message.is_some() {
            record.error_message = error_message;
        }
        self.write_record(&record).await
    }

    async fn store_result(
        &self,
        job_id: &str,
        result: serde_json::Value,
        ttl_seconds: u64,
    ) -> Result<(), RosterServiceError> {
        let body = result.to_string();
        let size = body.len() as u64;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::result_key(job_id), body, ttl_seconds)
            .await?;

        if let Some(mut record) = self.read_record(job_id).await? {
            record.result_available = true;
            record.result_size_bytes = Some(size);
            self.write_record(&record).await?;
        }
        Ok(())
    }

    async fn get_result(
        &self,
        job_id: &str,
    ) -> Result<Option<serde_json::Value>, RosterServiceError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::result_key(job_id)).await?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| RosterServiceError::Internal(format!("corrupt result body: {e}"))),
        }
    }

    async fn request_cancel(&self, job_id: &str) -> Result<bool, RosterServiceError> {
        let Some(mut record) = self.read_record(job_id).await? else {
            return Ok(false);
        };
        if record.status.is_terminal() {
            return Ok(true);
        }
        record.cancel_requested = true;
        self.write_record(&record).await?;
        Ok(true)
    }

    /// Scans the job index and expires completed/failed jobs whose result
    /// TTL has elapsed.
    #[tracing::instrument(skip(self))]
    async fn cleanup_expired(&self, ttl_seconds: u64) -> Result<usize, RosterServiceError> {
        let mut conn = self.conn.clone();
        let job_ids: Vec<String> = conn.smembers(Self::jobs_index_key()).await?;
        let now = Utc::now();
        let mut expired = 0;

        for job_id in job_ids {
            let Some(mut record) = self.read_record(&job_id).await? else {
                let _: () = conn.srem(Self::jobs_index_key(), &job_id).await?;
                continue;
            };
            if !matches!(record.status, JobStatus::Completed | JobStatus::Failed) {
                continue;
            }
            let Some(completed_at) = record.completed_at else {
                continue;
            };
            if (now - completed_at).num_seconds() as u64 > ttl_seconds {
                record.status = JobStatus::Expired;
                record.result_available = false;
                self.write_record(&record).await?;
                let _: () = conn.del(Self::result_key(&job_id)).await?;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
