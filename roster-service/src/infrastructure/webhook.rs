use std::time::Duration;

use async_trait::async_trait;

use crate::domain::job::JobStatus;
use crate::domain::notify::WebhookNotifier;

/// HTTP webhook delivery. Fire-and-forget with a short timeout: failures
/// are logged and swallowed, never surfaced to the job lifecycle.
pub struct HttpWebhookNotifier {
    client: reqwest::Client,
}

impl HttpWebhookNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpWebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    #[tracing::instrument(skip(self))]
    async fn notify(&self, url: &str, job_id: &str, status: JobStatus) {
        let body = serde_json::json!({
            "jobId": job_id,
            "status": status,
            "notifiedAt": chrono::Utc::now().to_rfc3339(),
        });
        match self.client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(job_id, url, "webhook delivered");
            }
            Ok(response) => {
                tracing::warn!(job_id, url, status = %response.status(), "webhook rejected");
            }
            Err(e) => {
                tracing::warn!(job_id, url, "webhook delivery failed: {e}");
            }
        }
    }
}
