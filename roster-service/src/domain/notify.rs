use async_trait::async_trait;

use crate::domain::job::JobStatus;

/// Completion notifications for jobs that registered a webhook URL.
///
/// Strictly best-effort: implementations log failures and never propagate
/// them, so a dead webhook endpoint cannot affect job state.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn notify(&self, url: &str, job_id: &str, status: JobStatus);
}
