use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use utoipa::ToSchema;

use roster_engine::domain::{EmptySlotsRequest, IncrementalRequest, SolveRequest};
use roster_engine::engine::{
    SolveOptions, solve_empty_slots_with_options, solve_incremental_with_options,
    solve_with_options,
};
use roster_engine::limits::estimate_problem;

use crate::config::ServiceConfig;
use crate::domain::cache::{EmployeeCountCache, pattern_cache_key};
use crate::domain::job::{JobRecord, JobStatus, JobStore};
use crate::domain::job_state::QueuedJob;
use crate::domain::notify::WebhookNotifier;
use crate::error::RosterServiceError;

/// Which engine entry point a request document routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMode {
    Standard,
    Incremental,
    EmptySlots,
}

pub fn detect_mode(input: &serde_json::Value) -> SolveMode {
    if input.get("temporalWindow").is_some() {
        SolveMode::Incremental
    } else if input.get("emptySlots").is_some() {
        SolveMode::EmptySlots
    } else {
        SolveMode::Standard
    }
}

/// Submit response: job handle plus the up-front feasibility snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasibility_check: Option<FeasibilityCheck>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityCheck {
    pub estimated_variables: u64,
    pub warnings: Vec<String>,
    /// Previously observed minimum employee counts per requirement id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cached_employee_counts: BTreeMap<String, u32>,
}

/// Orchestrates the solve-job lifecycle: synchronous solves, submission
/// with pre-checks, worker processing with the hard outer timeout,
/// cancellation points and result retrieval.
pub struct SolveService {
    job_store: Arc<dyn JobStore>,
    notifier: Arc<dyn WebhookNotifier>,
    count_cache: Arc<dyn EmployeeCountCache>,
    config: ServiceConfig,
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl SolveService {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        notifier: Arc<dyn WebhookNotifier>,
        count_cache: Arc<dyn EmployeeCountCache>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            job_store,
            notifier,
            count_cache,
            config,
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn task_tracker(&self) -> &TaskTracker {
        &self.task_tracker
    }

    /// Signals the worker and cleanup loops to stop after their current
    /// iteration.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Synchronous solve: blocks the caller for the duration, bounded by
    /// the request time limit plus the hard margin.
    #[tracing::instrument(skip(self, input))]
    pub async fn solve_sync(
        &self,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, RosterServiceError> {
        let options = self.config.solve_options();
        let deadline = self.hard_deadline_seconds(&input);
        let handle =
            tokio::task::spawn_blocking(move || run_engine(&input, &options));
        match tokio::time::timeout(Duration::from_secs(deadline), handle).await {
            Err(_) => Err(RosterServiceError::HardTimeout(deadline)),
            Ok(Err(join_err)) => Err(RosterServiceError::Internal(format!(
                "solver task panicked: {join_err}"
            ))),
            Ok(Ok(result)) => result,
        }
    }

    /// Validates, estimates and enqueues a job. Malformed or oversized
    /// requests are rejected here, before any queue traffic.
    #[tracing::instrument(skip(self, input))]
    pub async fn submit(
        &self,
        input: serde_json::Value,
        webhook_url: Option<String>,
    ) -> Result<SubmitResponse, RosterServiceError> {
        let feasibility = self.pre_check(&input)?;
        let record = self.job_store.enqueue(input, webhook_url).await?;
        tracing::info!(job_id = %record.job_id, "job queued");
        Ok(SubmitResponse {
            job_id: record.job_id,
            status: record.status,
            created_at: record.created_at,
            feasibility_check: feasibility,
        })
    }

    /// Quick validation + capacity check at submit time.
    fn pre_check(
        &self,
        input: &serde_json::Value,
    ) -> Result<Option<FeasibilityCheck>, RosterServiceError> {
        if detect_mode(input) != SolveMode::Standard {
            // incremental / empty-slots requests validate in their entry points
            return Ok(None);
        }
        let request: SolveRequest = serde_json::from_value(input.clone())
            .map_err(|e| RosterServiceError::BadRequest(format!("unparseable input: {e}")))?;

        let report = roster_engine::validate::validate(&request);
        if !report.is_valid() {
            return Err(RosterServiceError::Validation { report });
        }

        let slot_estimate = request
            .demand_items
            .iter()
            .flat_map(|d| &d.requirements)
            .map(|r| {
                let codes = r.pattern_shift_codes();
                r.headcount
                    .as_ref()
                    .map(|h| h.total_per_day(&codes) as u64)
                    .unwrap_or(1)
            })
            .sum::<u64>()
            * request.planning_horizon.days() as u64;
        let estimate = estimate_problem(slot_estimate as usize, &request.employees);
        roster_engine::limits::check_problem_size(&estimate, self.config.server_tier)
            .map_err(RosterServiceError::Capacity)?;

        let mut cached_counts = BTreeMap::new();
        for demand in &request.demand_items {
            for requirement in &demand.requirements {
                let codes = requirement.pattern_shift_codes();
                let headcount = requirement
                    .headcount
                    .as_ref()
                    .map(|h| h.total_per_day(&codes))
                    .unwrap_or(1);
                let key =
                    pattern_cache_key(&requirement.work_pattern, &demand.demand_id, headcount);
                if let Some(count) = self.count_cache.get(&key) {
                    cached_counts.insert(requirement.requirement_id.clone(), count);
                }
            }
        }

        Ok(Some(FeasibilityCheck {
            estimated_variables: estimate.estimated_variables,
            warnings: report
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.field, w.message))
                .collect(),
            cached_employee_counts: cached_counts,
        }))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_status(&self, job_id: &str) -> Result<JobRecord, RosterServiceError> {
        self.job_store
            .get_job(job_id)
            .await?
            .ok_or_else(|| RosterServiceError::NotFound(format!("job {job_id} not found")))
    }

    /// Result retrieval with the full status ladder: unknown jobs are 404,
    /// failed/cancelled/expired are 410, unfinished are 425.
    #[tracing::instrument(skip(self))]
    pub async fn get_result(
        &self,
        job_id: &str,
    ) -> Result<serde_json::Value, RosterServiceError> {
        let record = self.get_status(job_id).await?;
        match record.status {
            JobStatus::Completed => self.job_store.get_result(job_id).await?.ok_or_else(|| {
                RosterServiceError::Gone(format!("result for job {job_id} has expired"))
            }),
            JobStatus::Failed => Err(RosterServiceError::Gone(format!(
                "job {job_id} failed: {}",
                record.error_message.unwrap_or_default()
            ))),
            JobStatus::Cancelled => {
                Err(RosterServiceError::Gone(format!("job {job_id} was cancelled")))
            }
            JobStatus::Expired => Err(RosterServiceError::Gone(format!(
                "result for job {job_id} has expired"
            ))),
            JobStatus::Queued | JobStatus::InProgress => Err(RosterServiceError::NotReady(
                format!("job {job_id} is {}", record.status.as_str()),
            )),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, job_id: &str) -> Result<JobRecord, RosterServiceError> {
        if !self.job_store.request_cancel(job_id).await? {
            return Err(RosterServiceError::NotFound(format!("job {job_id} not found")));
        }
        self.get_status(job_id).await
    }

    /// Spawns the configured number of queue workers plus the expiry
    /// cleanup loop onto the task tracker.
    pub fn spawn_workers(self: &Arc<Self>) {
        for worker in 0..self.config.worker_count.max(1) {
            let service = Arc::clone(self);
            let span = tracing::info_span!("worker", worker);
            self.task_tracker.spawn(
                async move {
                    service.worker_loop().await;
                }
                .instrument(span),
            );
        }
        let service = Arc::clone(self);
        self.task_tracker.spawn(async move {
            service.cleanup_loop().await;
        });
    }

    async fn worker_loop(&self) {
        loop {
            let popped = tokio::select! {
                () = self.shutdown.cancelled() => break,
                popped = self.job_store.next_job(5) => popped,
            };
            match popped {
                Ok(Some(job_id)) => {
                    if let Err(e) = self.process_job(&job_id).await {
                        tracing::error!(job_id, "job processing failed: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("queue pop failed, backing off: {e}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
        tracing::info!("worker loop stopped");
    }

    async fn cleanup_loop(&self) {
        let interval = Duration::from_secs(self.config.cleanup_interval_seconds.max(30));
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            match self
                .job_store
                .cleanup_expired(self.config.result_ttl_seconds)
                .await
            {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "expired jobs cleaned up"),
                Err(e) => tracing::warn!("cleanup sweep failed: {e}"),
            }
        }
    }

    /// Processes one dequeued job through the typestate lifecycle, with the
    /// cancellation flag honoured before work starts and again before the
    /// result is stored.
    #[tracing::instrument(skip(self))]
    pub async fn process_job(&self, job_id: &str) -> Result<(), RosterServiceError> {
        let Some(record) = self.job_store.get_job(job_id).await? else {
            tracing::warn!(job_id, "dequeued job no longer exists");
            return Ok(());
        };
        let Some(queued) = QueuedJob::from_record(record) else {
            tracing::warn!(job_id, "dequeued job is not in queued status");
            return Ok(());
        };

        if queued.cancel_requested() {
            let (finished, status) = queued.cancel();
            self.finish(finished.into_inner(), status, None).await;
            return Ok(());
        }

        let (in_progress, status) = queued.start();
        self.job_store.update_status(job_id, status, None).await?;

        let Some(input) = self.job_store.get_input(job_id).await? else {
            let (finished, status) = in_progress.fail();
            self.finish(
                finished.into_inner(),
                status,
                Some("job input payload is missing".to_string()),
            )
            .await;
            return Ok(());
        };

        let options = self.config.solve_options();
        let deadline = self.hard_deadline_seconds(&input);
        let solve_input = input.clone();
        let handle = tokio::task::spawn_blocking(move || run_engine(&solve_input, &options));
        let outcome = match tokio::time::timeout(Duration::from_secs(deadline), handle).await {
            Err(_) => Err(RosterServiceError::HardTimeout(deadline)),
            Ok(Err(join_err)) => Err(RosterServiceError::Internal(format!(
                "solver task panicked: {join_err}"
            ))),
            Ok(Ok(result)) => result,
        };

        // cancellation checked again before results are stored; a cancel
        // during the solve discards the result on completion
        let cancel_requested = self
            .job_store
            .get_job(job_id)
            .await?
            .is_some_and(|r| r.cancel_requested);

        match (outcome, cancel_requested) {
            (_, true) => {
                let (finished, status) = in_progress.cancel();
                self.finish(finished.into_inner(), status, None).await;
            }
            (Ok(result), false) => {
                self.record_employee_counts(&input, &result);
                self.job_store
                    .store_result(job_id, result, self.config.result_ttl_seconds)
                    .await?;
                let (finished, status) = in_progress.complete();
                self.finish(finished.into_inner(), status, None).await;
            }
            (Err(err), false) => {
                let (finished, status) = in_progress.fail();
                self.finish(finished.into_inner(), status, Some(err.to_string()))
                    .await;
            }
        }
        Ok(())
    }

    /// Terminal transition: persist the status and fire the webhook.
    async fn finish(&self, record: JobRecord, status: JobStatus, error: Option<String>) {
        if let Err(e) = self
            .job_store
            .update_status(&record.job_id, status, error)
            .await
        {
            tracing::error!(job_id = %record.job_id, "failed to persist terminal status: {e}");
        }
        if let Some(url) = record.webhook_url.as_deref() {
            self.notifier.notify(url, &record.job_id, status).await;
        }
        tracing::info!(job_id = %record.job_id, status = status.as_str(), "job finished");
    }

    /// Remembers the preprocessor's employee counts for future submit-time
    /// feasibility snapshots, keyed by the same pattern/demand shape the
    /// submit path hashes.
    fn record_employee_counts(&self, input: &serde_json::Value, result: &serde_json::Value) {
        let Some(outcomes) = result.get("icpmp").and_then(|v| v.as_array()) else {
            return;
        };
        let Ok(request) = serde_json::from_value::<SolveRequest>(input.clone()) else {
            return;
        };
        for outcome in outcomes {
            let (Some(requirement_id), Some(required)) = (
                outcome.get("requirementId").and_then(|v| v.as_str()),
                outcome.get("employeesRequired").and_then(|v| v.as_u64()),
            ) else {
                continue;
            };
            for demand in &request.demand_items {
                for requirement in &demand.requirements {
                    if requirement.requirement_id != requirement_id {
                        continue;
                    }
                    let codes = requirement.pattern_shift_codes();
                    let headcount = requirement
                        .headcount
                        .as_ref()
                        .map(|h| h.total_per_day(&codes))
                        .unwrap_or(1);
                    let key = pattern_cache_key(
                        &requirement.work_pattern,
                        &demand.demand_id,
                        headcount,
                    );
                    self.count_cache.put(&key, required as u32);
                }
            }
        }
    }

    fn hard_deadline_seconds(&self, input: &serde_json::Value) -> u64 {
        let requested = input
            .get("solverRunTime")
            .and_then(|v| v.get("maxSeconds"))
            .and_then(|v| v.as_u64())
            .unwrap_or(15);
        requested.min(self.config.max_time_limit_seconds) + self.config.hard_timeout_margin_seconds
    }
}

/// Routes a request document to the matching engine entry point.
fn run_engine(
    input: &serde_json::Value,
    options: &SolveOptions,
) -> Result<serde_json::Value, RosterServiceError> {
    let to_value = |output: roster_engine::output::SolveOutput| {
        serde_json::to_value(output)
            .map_err(|e| RosterServiceError::Internal(format!("output serialisation failed: {e}")))
    };
    match detect_mode(input) {
        SolveMode::Incremental => {
            let request: IncrementalRequest = serde_json::from_value(input.clone())
                .map_err(|e| RosterServiceError::BadRequest(format!("unparseable input: {e}")))?;
            to_value(solve_incremental_with_options(&request, options)?)
        }
        SolveMode::EmptySlots => {
            let request: EmptySlotsRequest = serde_json::from_value(input.clone())
                .map_err(|e| RosterServiceError::BadRequest(format!("unparseable input: {e}")))?;
            to_value(solve_empty_slots_with_options(&request, options)?)
        }
        SolveMode::Standard => {
            let request: SolveRequest = serde_json::from_value(input.clone())
                .map_err(|e| RosterServiceError::BadRequest(format!("unparseable input: {e}")))?;
            to_value(solve_with_options(&request, options)?)
        }
    }
}
