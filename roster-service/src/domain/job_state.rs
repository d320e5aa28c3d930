use crate::domain::job::{JobRecord, JobStatus};

/// Wrapper for a job in `Queued` status.
/// Consuming `start` moves it to `InProgressJob`.
pub struct QueuedJob {
    inner: JobRecord,
}

/// Wrapper for a job in `InProgress` status.
/// Consuming `complete`, `fail` or `cancel` moves it to a terminal state.
pub struct InProgressJob {
    inner: JobRecord,
}

/// Terminal wrapper; the status lives on the inner record.
pub struct FinishedJob {
    inner: JobRecord,
}

impl QueuedJob {
    pub fn from_record(record: JobRecord) -> Option<Self> {
        if record.status == JobStatus::Queued {
            Some(Self { inner: record })
        } else {
            None
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.job_id
    }

    pub fn cancel_requested(&self) -> bool {
        self.inner.cancel_requested
    }

    pub fn start(mut self) -> (InProgressJob, JobStatus) {
        self.inner.status = JobStatus::InProgress;
        (InProgressJob { inner: self.inner }, JobStatus::InProgress)
    }

    pub fn cancel(mut self) -> (FinishedJob, JobStatus) {
        self.inner.status = JobStatus::Cancelled;
        (FinishedJob { inner: self.inner }, JobStatus::Cancelled)
    }
}

impl InProgressJob {
    pub fn id(&self) -> &str {
        &self.inner.job_id
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.inner.webhook_url.as_deref()
    }

    pub fn complete(mut self) -> (FinishedJob, JobStatus) {
        self.inner.status = JobStatus::Completed;
        (FinishedJob { inner: self.inner }, JobStatus::Completed)
    }

    pub fn fail(mut self) -> (FinishedJob, JobStatus) {
        self.inner.status = JobStatus::Failed;
        (FinishedJob { inner: self.inner }, JobStatus::Failed)
    }

    pub fn cancel(mut self) -> (FinishedJob, JobStatus) {
        self.inner.status = JobStatus::Cancelled;
        (FinishedJob { inner: self.inner }, JobStatus::Cancelled)
    }
}

impl FinishedJob {
    pub fn status(&self) -> JobStatus {
        self.inner.status
    }

    pub fn into_inner(self) -> JobRecord {
        self.inner
    }
}
