use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::job::JobStatus;

/// Read seam for per-host job counts, backed by the job store (or a shared
/// database when the fleet spans instances).
#[async_trait]
pub trait JobCountSource: Send + Sync {
    /// Count jobs in `status` on `host_name` with start time in
    /// `[min_start, max_start)`; unset bounds are unbounded.
    async fn count_jobs(
        &self,
        host_name: &str,
        status: JobStatus,
        min_start: Option<DateTime<Utc>>,
        max_start: Option<DateTime<Utc>>,
    ) -> Result<u64>;
}

/// Selects the least-loaded fleet instance for new placements.
///
/// Candidate hosts are injected by the caller (fleet membership discovery is
/// an external concern). Probes fan out concurrently; a host whose probe
/// fails is treated as unavailable for this scan. When no host is under the
/// threshold, or every probe fails, the local instance is returned so
/// placement is never refused.
pub struct FleetLoadBalancer {
    source: Arc<dyn JobCountSource>,
    local_host: String,
}

impl FleetLoadBalancer {
    pub fn new(source: Arc<dyn JobCountSource>, local_host: impl Into<String>) -> Self {
        Self {
            source,
            local_host: local_host.into(),
        }
    }

    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    /// Running-job count for `host_name` (local instance when `None`),
    /// optionally windowed by start time.
    pub async fn count_running_jobs(
        &self,
        host_name: Option<&str>,
        min_start: Option<DateTime<Utc>>,
        max_start: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let host = host_name.unwrap_or(&self.local_host);
        self.source
            .count_jobs(host, JobStatus::Running, min_start, max_start)
            .await
    }

    /// Pick the candidate with the smallest running-job count strictly below
    /// `min_job_threshold`. Ties resolve to the first such host in input
    /// order. Falls back to the local host when nothing qualifies.
    pub async fn pick_idle_instance(
        &self,
        candidates: &[String],
        min_job_threshold: u64,
    ) -> String {
        let mut probes = JoinSet::new();
        for (index, host) in candidates.iter().enumerate() {
            let source = self.source.clone();
            let host = host.clone();
            probes.spawn(async move {
                let count = source
                    .count_jobs(&host, JobStatus::Running, None, None)
                    .await;
                (index, host, count)
            });
        }

        // (count, input index) ordering keeps tie-breaks deterministic.
        let mut best: Option<(u64, usize, String)> = None;
        while let Some(joined) = probes.join_next().await {
            let (index, host, count) = match joined {
                Ok(probe) => probe,
                Err(e) => {
                    tracing::warn!(error = %e, "Count probe task failed");
                    continue;
                }
            };
            let count = match count {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Host excluded from scan");
                    continue;
                }
            };
            if count >= min_job_threshold {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_count, best_index, _)) => {
                    count < *best_count || (count == *best_count && index < *best_index)
                }
            };
            if better {
                best = Some((count, index, host));
            }
        }

        match best {
            Some((count, _, host)) => {
                tracing::info!(host = %host, running = count, "Idle instance selected");
                host
            }
            None => {
                tracing::info!(host = %self.local_host, "No idle instance, falling back to local");
                self.local_host.clone()
            }
        }
    }
}
