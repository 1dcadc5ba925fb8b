use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{FedjobError, Result};
use crate::job::execution::{JobExecution, JobStatus};
use crate::job::request::{JobRequest, JobSearchFilter};
use crate::scheduler::JobCountSource;

/// Result of a conditional transition attempt.
///
/// `Ignored` is the no-op arm for idempotent operations: the job was already
/// terminal, the loser of a kill/timeout race observes it and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(JobStatus),
    Ignored(JobStatus),
}

impl TransitionOutcome {
    pub fn status(self) -> JobStatus {
        match self {
            TransitionOutcome::Applied(s) | TransitionOutcome::Ignored(s) => s,
        }
    }

    pub fn applied(self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// Persistence seam for job requests and execution records. The state
/// machine runs inside the store: every transition is conditional on the
/// current status and serialized per job, so concurrent kill/timeout/finish
/// events resolve to exactly one winner.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new request in `Init` state. Fails on duplicate id.
    async fn create(&self, request: JobRequest, host_name: String) -> Result<Uuid>;

    async fn get(&self, job_id: Uuid) -> Result<JobExecution>;

    async fn get_request(&self, job_id: Uuid) -> Result<JobRequest>;

    async fn status(&self, job_id: Uuid) -> Result<JobStatus>;

    /// `Init -> Running`, binding the resolved cluster/command pair. Raises
    /// `IllegalTransition` if the job is not in `Init` (programming error),
    /// except when it was already killed, which is reported as `Ignored`.
    async fn mark_running(
        &self,
        job_id: Uuid,
        cluster_id: Uuid,
        command_id: Uuid,
    ) -> Result<TransitionOutcome>;

    /// Record a terminal outcome from execution (`Succeeded`/`Failed`), or
    /// `Init -> Failed` for resolution/dispatch failures. A job already
    /// terminal (killed meanwhile) is left untouched and reported `Ignored`.
    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        exit_code: Option<i32>,
        stdout: Option<String>,
        stderr: Option<String>,
        message: Option<String>,
    ) -> Result<TransitionOutcome>;

    /// `Init|Running -> Killed`. Idempotent: already-terminal jobs are
    /// reported `Ignored` with their current status.
    async fn kill(&self, job_id: Uuid, message: Option<String>) -> Result<TransitionOutcome>;

    async fn search(&self, filter: &JobSearchFilter) -> Result<Vec<JobExecution>>;
}

struct JobEntry {
    request: JobRequest,
    execution: JobExecution,
}

/// In-memory job store. The outer lock guards only map membership; every
/// transition runs under the per-job mutex, so unrelated jobs never contend.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Arc<Mutex<JobEntry>>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn entry(&self, job_id: Uuid) -> Result<Arc<Mutex<JobEntry>>> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(FedjobError::JobNotFound(job_id))
    }
}

/// The in-memory store doubles as the balancer's count source.
#[async_trait]
impl JobCountSource for InMemoryJobStore {
    /// Count jobs in `status` on `host_name` whose start time falls in
    /// `[min_start, max_start)`. Unset bounds are unbounded.
    async fn count_jobs(
        &self,
        host_name: &str,
        status: JobStatus,
        min_start: Option<DateTime<Utc>>,
        max_start: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let entries: Vec<_> = self.jobs.read().await.values().cloned().collect();
        let mut count = 0u64;
        for entry in entries {
            let entry = entry.lock().await;
            let exec = &entry.execution;
            if exec.status != status || exec.host_name != host_name {
                continue;
            }
            let started = match exec.started_at {
                Some(t) => t,
                None => continue,
            };
            if min_start.is_some_and(|min| started < min) {
                continue;
            }
            if max_start.is_some_and(|max| started >= max) {
                continue;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, request: JobRequest, host_name: String) -> Result<Uuid> {
        let id = request.id;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(FedjobError::Validation(format!("duplicate job id {id}")));
        }
        let execution = JobExecution::new(id, host_name);
        jobs.insert(
            id,
            Arc::new(Mutex::new(JobEntry { request, execution })),
        );
        Ok(id)
    }

    async fn get(&self, job_id: Uuid) -> Result<JobExecution> {
        let entry = self.entry(job_id).await?;
        let entry = entry.lock().await;
        Ok(entry.execution.clone())
    }

    async fn get_request(&self, job_id: Uuid) -> Result<JobRequest> {
        let entry = self.entry(job_id).await?;
        let entry = entry.lock().await;
        Ok(entry.request.clone())
    }

    async fn status(&self, job_id: Uuid) -> Result<JobStatus> {
        let entry = self.entry(job_id).await?;
        let entry = entry.lock().await;
        Ok(entry.execution.status)
    }

    async fn mark_running(
        &self,
        job_id: Uuid,
        cluster_id: Uuid,
        command_id: Uuid,
    ) -> Result<TransitionOutcome> {
        let entry = self.entry(job_id).await?;
        let mut entry = entry.lock().await;
        let current = entry.execution.status;
        if current.is_terminal() {
            // Killed before dispatch completed.
            return Ok(TransitionOutcome::Ignored(current));
        }
        if !current.can_transition(JobStatus::Running) {
            return Err(FedjobError::IllegalTransition {
                from: current,
                to: JobStatus::Running,
            });
        }
        entry.execution.mark_running(cluster_id, command_id);
        tracing::info!(job_id = %job_id, cluster_id = %cluster_id, command_id = %command_id, "Job running");
        Ok(TransitionOutcome::Applied(JobStatus::Running))
    }

    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        exit_code: Option<i32>,
        stdout: Option<String>,
        stderr: Option<String>,
        message: Option<String>,
    ) -> Result<TransitionOutcome> {
        if !matches!(status, JobStatus::Succeeded | JobStatus::Failed) {
            return Err(FedjobError::Internal(format!(
                "finish called with non-outcome status {status}"
            )));
        }
        let entry = self.entry(job_id).await?;
        let mut entry = entry.lock().await;
        let current = entry.execution.status;
        if current.is_terminal() {
            tracing::debug!(job_id = %job_id, status = %current, "Finish ignored, job already terminal");
            return Ok(TransitionOutcome::Ignored(current));
        }
        if !current.can_transition(status) {
            return Err(FedjobError::IllegalTransition {
                from: current,
                to: status,
            });
        }
        entry.execution.exit_code = exit_code;
        entry.execution.stdout = stdout;
        entry.execution.stderr = stderr;
        entry.execution.mark_finished(status, message);
        tracing::info!(job_id = %job_id, status = %status, exit_code = ?exit_code, "Job finished");
        Ok(TransitionOutcome::Applied(status))
    }

    async fn kill(&self, job_id: Uuid, message: Option<String>) -> Result<TransitionOutcome> {
        let entry = self.entry(job_id).await?;
        let mut entry = entry.lock().await;
        let current = entry.execution.status;
        if current.is_terminal() {
            tracing::debug!(job_id = %job_id, status = %current, "Kill ignored, job already terminal");
            return Ok(TransitionOutcome::Ignored(current));
        }
        entry.execution.mark_finished(JobStatus::Killed, message);
        tracing::info!(job_id = %job_id, from = %current, "Job killed");
        Ok(TransitionOutcome::Applied(JobStatus::Killed))
    }

    async fn search(&self, filter: &JobSearchFilter) -> Result<Vec<JobExecution>> {
        let entries: Vec<_> = self.jobs.read().await.values().cloned().collect();
        let mut matched = Vec::new();
        for entry in entries {
            let entry = entry.lock().await;
            let exec = &entry.execution;
            if filter
                .command_id
                .is_some_and(|id| exec.command_id != Some(id))
            {
                continue;
            }
            if filter
                .statuses
                .as_ref()
                .is_some_and(|s| !s.contains(&exec.status))
            {
                continue;
            }
            matched.push(exec.clone());
        }
        matched.sort_by_key(|e| (e.submitted_at, e.id.to_string()));
        let page: Vec<_> = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }
}
