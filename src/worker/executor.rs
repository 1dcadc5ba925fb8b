use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ExecConfig;
use crate::error::{FedjobError, Result};

/// What an execution produced. `exit_code` is `None` when the process was
/// terminated by a signal.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execution collaborator seam. The orchestrator dispatches, awaits, and
/// terminates through this trait; process supervision details live behind it.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Start the process for `job_id`. The full argv is `executable` (the
    /// command's prefix) followed by `args` (the job's arguments).
    async fn dispatch(&self, job_id: Uuid, executable: &[String], args: &[String]) -> Result<()>;

    /// Wait for the process to exit and collect its output. Consumes the
    /// handle; a second wait for the same job is an error.
    async fn wait(&self, job_id: Uuid) -> Result<ExecutionOutcome>;

    /// Request termination of the process. Takes effect even while a `wait`
    /// for the same job is in flight. Best-effort: succeeds silently if the
    /// process already exited or was never dispatched.
    async fn terminate(&self, job_id: Uuid) -> Result<()>;
}

/// Live handle to one dispatched process: a kill signal for the supervisor
/// task and the channel its outcome arrives on. The kill token stays in the
/// map for the whole wait so `terminate` can always reach it; only the
/// receiver is taken out.
struct ProcessHandle {
    kill: CancellationToken,
    outcome: Option<oneshot::Receiver<std::io::Result<ExecutionOutcome>>>,
}

/// Runs jobs as local child processes with piped stdio.
///
/// Each dispatch spawns a supervisor task that owns the `Child`, drains its
/// output, and reaps it on exit or on the kill signal. `terminate` only
/// cancels the kill token, so it never contends with an in-flight `wait`.
pub struct ProcessExecutor {
    config: ExecConfig,
    handles: Mutex<HashMap<Uuid, ProcessHandle>>,
}

impl ProcessExecutor {
    pub fn new(config: ExecConfig) -> Self {
        Self {
            config,
            handles: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessExecutor {
    async fn dispatch(&self, job_id: Uuid, executable: &[String], args: &[String]) -> Result<()> {
        let program = executable
            .first()
            .ok_or_else(|| FedjobError::Dispatch("empty executable".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(&executable[1..])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| FedjobError::Dispatch(format!("failed to spawn {program}: {e}")))?;
        tracing::info!(job_id = %job_id, program = %program, "Process dispatched");

        let kill = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let supervisor_kill = kill.clone();
        let limit = self.config.output_limit_bytes;
        tokio::spawn(async move {
            let result = supervise(child, supervisor_kill, limit).await;
            let _ = tx.send(result);
        });

        self.handles.lock().await.insert(
            job_id,
            ProcessHandle {
                kill,
                outcome: Some(rx),
            },
        );
        Ok(())
    }

    async fn wait(&self, job_id: Uuid) -> Result<ExecutionOutcome> {
        // Take only the receiver; the kill token must stay reachable for
        // terminate while this wait is parked.
        let rx = {
            let mut handles = self.handles.lock().await;
            let handle = handles
                .get_mut(&job_id)
                .ok_or_else(|| FedjobError::Internal(format!("no process handle for job {job_id}")))?;
            handle.outcome.take().ok_or_else(|| {
                FedjobError::Internal(format!("job {job_id} is already being waited on"))
            })?
        };

        let result = match rx.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(FedjobError::Dispatch(format!("wait failed: {e}"))),
            Err(_) => Err(FedjobError::Internal(format!(
                "supervisor for job {job_id} dropped"
            ))),
        };
        self.handles.lock().await.remove(&job_id);
        result
    }

    async fn terminate(&self, job_id: Uuid) -> Result<()> {
        let handles = self.handles.lock().await;
        if let Some(handle) = handles.get(&job_id) {
            handle.kill.cancel();
            tracing::info!(job_id = %job_id, "Process termination requested");
        }
        Ok(())
    }
}

/// Own the child to completion: drain its output concurrently, wait for exit
/// or the kill signal, and always reap.
async fn supervise(
    mut child: Child,
    kill: CancellationToken,
    limit: usize,
) -> std::io::Result<ExecutionOutcome> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = tokio::spawn(drain_capped(stdout, limit));
    let stderr_task = tokio::spawn(drain_capped(stderr, limit));

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = kill.cancelled() => {
            if let Err(e) = child.start_kill() {
                // Exited between the signal and the kill; reap below.
                tracing::debug!(error = %e, "Kill found no live process");
            }
            child.wait().await?
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    Ok(ExecutionOutcome {
        exit_code: status.code(),
        stdout: capture(&stdout),
        stderr: capture(&stderr),
    })
}

/// Read a pipe to EOF, keeping at most `limit` bytes. The pipe is always
/// drained fully so the child never blocks on a full buffer.
async fn drain_capped<R>(reader: Option<R>, limit: usize) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if out.len() < limit {
                    let keep = n.min(limit - out.len());
                    out.extend_from_slice(&chunk[..keep]);
                }
            }
            Err(_) => break,
        }
    }
    out
}

/// Lossy-decode captured bytes; empty output becomes `None`.
fn capture(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).to_string())
}
