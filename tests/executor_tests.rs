use std::time::Duration;

use fedjob::config::ExecConfig;
use fedjob::worker::{ExecutionBackend, ProcessExecutor};
use uuid::Uuid;

fn test_executor() -> ProcessExecutor {
    ProcessExecutor::new(ExecConfig::default())
}

fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_dispatch_and_wait_captures_output() {
    let executor = test_executor();
    let job_id = Uuid::new_v4();

    executor
        .dispatch(job_id, &argv(["sh", "-c"]), &argv(["echo hello"]))
        .await
        .unwrap();
    let outcome = executor.wait(job_id).await.unwrap();

    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.success());
    assert_eq!(outcome.stdout.as_deref(), Some("hello\n"));
    assert!(outcome.stderr.is_none());
}

#[tokio::test]
async fn test_nonzero_exit_reported() {
    let executor = test_executor();
    let job_id = Uuid::new_v4();

    executor
        .dispatch(job_id, &argv(["sh", "-c"]), &argv(["exit 7"]))
        .await
        .unwrap();
    let outcome = executor.wait(job_id).await.unwrap();

    assert_eq!(outcome.exit_code, Some(7));
    assert!(!outcome.success());
}

#[tokio::test]
async fn test_terminate_while_wait_in_flight() {
    let executor = std::sync::Arc::new(test_executor());
    let job_id = Uuid::new_v4();

    executor
        .dispatch(job_id, &argv(["sh", "-c"]), &argv(["sleep 60"]))
        .await
        .unwrap();

    // Park a wait the way the orchestrator does, then terminate from the
    // side. The wait must return promptly with a signal exit, not ride out
    // the sleep.
    let waiter = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.wait(job_id).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    executor.terminate(job_id).await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("wait did not return after terminate")
        .unwrap()
        .unwrap();
    assert_eq!(outcome.exit_code, None); // killed by signal
}

#[tokio::test]
async fn test_terminate_unknown_job_is_noop() {
    let executor = test_executor();
    executor.terminate(Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn test_terminate_after_exit_is_noop() {
    let executor = test_executor();
    let job_id = Uuid::new_v4();

    executor
        .dispatch(job_id, &argv(["true"]), &[])
        .await
        .unwrap();
    let outcome = executor.wait(job_id).await.unwrap();
    assert_eq!(outcome.exit_code, Some(0));

    executor.terminate(job_id).await.unwrap();
}

#[tokio::test]
async fn test_second_wait_is_an_error() {
    let executor = test_executor();
    let job_id = Uuid::new_v4();

    executor
        .dispatch(job_id, &argv(["true"]), &[])
        .await
        .unwrap();
    executor.wait(job_id).await.unwrap();
    assert!(executor.wait(job_id).await.is_err());
}

#[tokio::test]
async fn test_empty_executable_is_dispatch_error() {
    let executor = test_executor();
    let err = executor
        .dispatch(Uuid::new_v4(), &[], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, fedjob::FedjobError::Dispatch(_)));
}
