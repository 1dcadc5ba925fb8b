use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle status.
///
/// `Init -> Running -> {Succeeded, Failed, Killed}`, plus the short circuits
/// `Init -> Failed` (resolution/dispatch failure) and `Init -> Killed`
/// (killed before dispatch). Terminal states accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Init,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Killed
        )
    }

    /// Whether the state machine permits `self -> to`.
    pub fn can_transition(self, to: JobStatus) -> bool {
        match self {
            JobStatus::Init => matches!(
                to,
                JobStatus::Running | JobStatus::Failed | JobStatus::Killed
            ),
            JobStatus::Running => to.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Init => write!(f, "init"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Killed => write!(f, "killed"),
        }
    }
}

/// Mutable execution record for one job, owned by the job store. All
/// mutation goes through the store's conditional transitions
/// (`mark_running`/`finish`/`kill` on [`JobStore`](crate::job::JobStore))
/// under the per-job lock; once a terminal status is reached the record is
/// effectively frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub status: JobStatus,
    /// Bound exactly once, when the job leaves `Init` for `Running`.
    pub cluster_id: Option<Uuid>,
    pub command_id: Option<Uuid>,
    /// Fleet instance the job was placed on.
    pub host_name: String,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// Set iff `status` is terminal, exactly once.
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Human-readable cause for Failed/Killed terminal states.
    pub status_message: Option<String>,
}

impl JobExecution {
    pub fn new(id: Uuid, host_name: String) -> Self {
        Self {
            id,
            status: JobStatus::Init,
            cluster_id: None,
            command_id: None,
            host_name,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            exit_code: None,
            stdout: None,
            stderr: None,
            status_message: None,
        }
    }

    /// Record the Init -> Running transition, binding the resolved pair.
    pub(crate) fn mark_running(&mut self, cluster_id: Uuid, command_id: Uuid) {
        self.status = JobStatus::Running;
        self.cluster_id = Some(cluster_id);
        self.command_id = Some(command_id);
        self.started_at = Some(Utc::now());
    }

    /// Record a terminal transition.
    pub(crate) fn mark_finished(&mut self, status: JobStatus, message: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(Utc::now());
        if message.is_some() {
            self.status_message = message;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Init.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Killed.is_terminal());
    }

    #[test]
    fn legal_transitions() {
        assert!(JobStatus::Init.can_transition(JobStatus::Running));
        assert!(JobStatus::Init.can_transition(JobStatus::Failed));
        assert!(JobStatus::Init.can_transition(JobStatus::Killed));
        assert!(JobStatus::Running.can_transition(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition(JobStatus::Failed));
        assert!(JobStatus::Running.can_transition(JobStatus::Killed));
    }

    #[test]
    fn illegal_transitions() {
        assert!(!JobStatus::Init.can_transition(JobStatus::Succeeded));
        assert!(!JobStatus::Running.can_transition(JobStatus::Init));
        for terminal in [JobStatus::Succeeded, JobStatus::Failed, JobStatus::Killed] {
            assert!(!terminal.can_transition(JobStatus::Running));
            assert!(!terminal.can_transition(JobStatus::Killed));
        }
    }
}
