//! The coordinating component: submission, placement, dispatch, lifecycle
//! transitions, kill, polling, and search.
//!
//! Submission is validated synchronously; everything after `submit` returns
//! is reported through the job's status so clients always observe failures
//! by polling, never through a broken submission call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::CatalogSource;
use crate::config::InstanceConfig;
use crate::error::Result;
use crate::job::{JobExecution, JobRequest, JobSearchFilter, JobStatus, JobStore};
use crate::scheduler::{resolve, FleetLoadBalancer, JobCountSource};
use crate::worker::ExecutionBackend;

/// Orchestrates the full job lifecycle for one fleet instance.
///
/// Cheap to clone; all state lives behind `Arc`s so spawned per-job tasks
/// carry their own handle.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<InstanceConfig>,
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn JobStore>,
    backend: Arc<dyn ExecutionBackend>,
    balancer: Arc<FleetLoadBalancer>,
    /// Cancellation tokens for per-job timeout watchdogs. A job reaching a
    /// terminal state through any path cancels its token.
    watchdogs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl Orchestrator {
    pub fn new(
        config: InstanceConfig,
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn JobStore>,
        counts: Arc<dyn JobCountSource>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        let balancer = Arc::new(FleetLoadBalancer::new(counts, config.host_name.clone()));
        Self {
            config: Arc::new(config),
            catalog,
            store,
            backend,
            balancer,
            watchdogs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn balancer(&self) -> &FleetLoadBalancer {
        &self.balancer
    }

    /// Submit a job. Validation errors surface here; any later failure
    /// becomes the job's terminal status.
    pub async fn submit(&self, request: JobRequest) -> Result<Uuid> {
        request.validate()?;

        let host = self.pick_placement().await;
        let job_id = self.store.create(request, host.clone()).await?;
        tracing::info!(job_id = %job_id, host = %host, "Job submitted");

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_job(job_id).await;
        });

        Ok(job_id)
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<JobStatus> {
        self.store.status(job_id).await
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobExecution> {
        self.store.get(job_id).await
    }

    pub async fn search(&self, filter: &JobSearchFilter) -> Result<Vec<JobExecution>> {
        self.store.search(filter).await
    }

    /// Kill a job. Idempotent: a job already terminal keeps its status,
    /// which is returned either way. The Killed status is recorded before
    /// the underlying process is asked to terminate.
    pub async fn kill(&self, job_id: Uuid) -> Result<JobStatus> {
        let outcome = self
            .store
            .kill(job_id, Some("killed by request".to_string()))
            .await?;
        if outcome.applied() {
            if let Err(e) = self.backend.terminate(job_id).await {
                tracing::warn!(job_id = %job_id, error = %e, "Terminate after kill failed");
            }
            self.clear_watchdog(job_id).await;
        }
        Ok(outcome.status())
    }

    /// Poll until the job is terminal or `max_wait_ms` elapses, returning
    /// the last observed status. Never errors on budget exhaustion; with a
    /// zero budget the current status is returned immediately. Holds no
    /// locks between polls.
    pub async fn wait_for_completion(
        &self,
        job_id: Uuid,
        max_wait_ms: u64,
        poll_interval_ms: u64,
    ) -> Result<JobStatus> {
        let interval = if poll_interval_ms == 0 {
            self.config.default_poll_interval_ms
        } else {
            poll_interval_ms
        };
        let deadline = tokio::time::Instant::now() + Duration::from_millis(max_wait_ms);

        loop {
            let status = self.store.status(job_id).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(status);
            }
            let sleep = Duration::from_millis(interval).min(deadline - now);
            tokio::time::sleep(sleep).await;
        }
    }

    /// Placement decision for a new submission: local unless this instance
    /// is at its running-job limit and the fleet has somewhere better.
    async fn pick_placement(&self) -> String {
        let local = self.config.host_name.clone();
        if self.config.fleet_hosts.is_empty() {
            return local;
        }
        let local_count = match self.balancer.count_running_jobs(None, None, None).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Local count probe failed, placing locally");
                return local;
            }
        };
        if local_count < self.config.max_running_jobs {
            return local;
        }
        self.balancer
            .pick_idle_instance(&self.config.fleet_hosts, self.config.max_running_jobs)
            .await
    }

    /// Drive one job from Init to a terminal state. Runs as a spawned task;
    /// every failure is recorded on the job, nothing propagates.
    async fn run_job(&self, job_id: Uuid) {
        match self.store.status(job_id).await {
            Ok(status) if status.is_terminal() => return, // killed before dispatch
            Ok(_) => {}
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job vanished before dispatch");
                return;
            }
        }

        let request = match self.store.get_request(job_id).await {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job vanished before dispatch");
                return;
            }
        };

        let resolution = match self.resolve_request(&request).await {
            Ok(resolution) => resolution,
            Err(e) => {
                self.fail_job(job_id, e.to_string()).await;
                return;
            }
        };

        if let Err(e) = self
            .backend
            .dispatch(job_id, &resolution.command.executable, &request.command_args)
            .await
        {
            self.fail_job(job_id, e.to_string()).await;
            return;
        }

        let started = match self
            .store
            .mark_running(job_id, resolution.cluster.id, resolution.command.id)
            .await
        {
            Ok(outcome) => outcome.applied(),
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Start transition failed");
                false
            }
        };
        if !started {
            // Killed while dispatching; tear the process back down.
            let _ = self.backend.terminate(job_id).await;
            let _ = self.backend.wait(job_id).await;
            return;
        }

        if let Some(timeout_ms) = request.timeout_ms {
            self.spawn_watchdog(job_id, timeout_ms).await;
        }

        let outcome = self.backend.wait(job_id).await;
        let archive = !request.disable_log_archival;
        let result = match outcome {
            Ok(outcome) => {
                let status = if outcome.success() {
                    JobStatus::Succeeded
                } else {
                    JobStatus::Failed
                };
                let stdout = if archive { outcome.stdout } else { None };
                let stderr = if archive { outcome.stderr } else { None };
                self.store
                    .finish(job_id, status, outcome.exit_code, stdout, stderr, None)
                    .await
            }
            Err(e) => {
                self.store
                    .finish(job_id, JobStatus::Failed, None, None, None, Some(e.to_string()))
                    .await
            }
        };
        if let Err(e) = result {
            tracing::error!(job_id = %job_id, error = %e, "Finish transition failed");
        }
        self.clear_watchdog(job_id).await;
    }

    async fn resolve_request(&self, request: &JobRequest) -> Result<crate::scheduler::Resolution> {
        let clusters = self
            .catalog
            .list_clusters(Some(crate::catalog::ClusterStatus::Up))
            .await?;
        let commands = self
            .catalog
            .list_commands(Some(crate::catalog::CommandStatus::Active))
            .await?;
        resolve(
            &request.cluster_criteria,
            &request.command_tags,
            &clusters,
            &commands,
        )
    }

    /// Record Init/Running -> Failed with a cause. Silently ignored when the
    /// job already reached a terminal state.
    async fn fail_job(&self, job_id: Uuid, message: String) {
        tracing::warn!(job_id = %job_id, message = %message, "Job failed");
        if let Err(e) = self
            .store
            .finish(job_id, JobStatus::Failed, None, None, None, Some(message))
            .await
        {
            tracing::error!(job_id = %job_id, error = %e, "Failure transition failed");
        }
        self.clear_watchdog(job_id).await;
    }

    /// Arm the timeout watchdog: one task per job, sleeping to the deadline
    /// under a cancellation token. Any terminal transition cancels the
    /// token; a fired watchdog goes through the same conditional kill as an
    /// explicit request, so the race has exactly one winner.
    async fn spawn_watchdog(&self, job_id: Uuid, timeout_ms: u64) {
        let token = CancellationToken::new();
        self.watchdogs.write().await.insert(job_id, token.clone());

        let orchestrator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                    orchestrator.fire_timeout(job_id, timeout_ms).await;
                }
            }
        });
    }

    async fn fire_timeout(&self, job_id: Uuid, timeout_ms: u64) {
        let outcome = self
            .store
            .kill(job_id, Some(format!("timeout after {timeout_ms}ms")))
            .await;
        match outcome {
            Ok(outcome) if outcome.applied() => {
                tracing::info!(job_id = %job_id, timeout_ms, "Job killed by timeout");
                if let Err(e) = self.backend.terminate(job_id).await {
                    tracing::warn!(job_id = %job_id, error = %e, "Terminate after timeout failed");
                }
            }
            Ok(_) => {} // lost the race to another terminal transition
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Timeout transition failed");
            }
        }
        self.clear_watchdog(job_id).await;
    }

    async fn clear_watchdog(&self, job_id: Uuid) {
        if let Some(token) = self.watchdogs.write().await.remove(&job_id) {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("host_name", &self.config.host_name)
            .finish_non_exhaustive()
    }
}
