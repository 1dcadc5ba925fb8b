use std::sync::Arc;

use fedjob::catalog::TagCriterion;
use fedjob::job::{InMemoryJobStore, JobRequest, JobStatus, JobStore};
use fedjob::scheduler::JobCountSource;
use uuid::Uuid;

fn request() -> JobRequest {
    let criterion = TagCriterion::new(["type:test"]).unwrap();
    JobRequest::new(vec![criterion], ["type:test"]).unwrap()
}

async fn running_job(store: &Arc<InMemoryJobStore>) -> Uuid {
    let id = store.create(request(), "host".to_string()).await.unwrap();
    store
        .mark_running(id, Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_finish_time_iff_terminal() {
    let store = InMemoryJobStore::new();
    let id = store.create(request(), "host".to_string()).await.unwrap();

    assert!(store.get(id).await.unwrap().finished_at.is_none());

    store
        .mark_running(id, Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap();
    assert!(store.get(id).await.unwrap().finished_at.is_none());

    store
        .finish(id, JobStatus::Succeeded, Some(0), None, None, None)
        .await
        .unwrap();
    let exec = store.get(id).await.unwrap();
    assert!(exec.status.is_terminal());
    assert!(exec.finished_at.is_some());
}

#[tokio::test]
async fn test_cluster_and_command_ids_set_together() {
    let store = InMemoryJobStore::new();
    let id = store.create(request(), "host".to_string()).await.unwrap();

    let exec = store.get(id).await.unwrap();
    assert!(exec.cluster_id.is_none() && exec.command_id.is_none());

    let cluster_id = Uuid::new_v4();
    let command_id = Uuid::new_v4();
    store.mark_running(id, cluster_id, command_id).await.unwrap();

    let exec = store.get(id).await.unwrap();
    assert_eq!(exec.cluster_id, Some(cluster_id));
    assert_eq!(exec.command_id, Some(command_id));

    // Terminal transition leaves the binding untouched.
    store.kill(id, None).await.unwrap();
    let exec = store.get(id).await.unwrap();
    assert_eq!(exec.cluster_id, Some(cluster_id));
    assert_eq!(exec.command_id, Some(command_id));
}

#[tokio::test]
async fn test_concurrent_kill_and_finish_single_winner() {
    for _ in 0..50 {
        let store = InMemoryJobStore::new();
        let id = running_job(&store).await;

        let kill_store = store.clone();
        let finish_store = store.clone();
        let kill = tokio::spawn(async move { kill_store.kill(id, None).await.unwrap() });
        let finish = tokio::spawn(async move {
            finish_store
                .finish(id, JobStatus::Succeeded, Some(0), None, None, None)
                .await
                .unwrap()
        });

        let (kill_outcome, finish_outcome) = (kill.await.unwrap(), finish.await.unwrap());
        let applied = [kill_outcome.applied(), finish_outcome.applied()];
        assert_eq!(applied.iter().filter(|a| **a).count(), 1);

        let exec = store.get(id).await.unwrap();
        assert!(exec.status.is_terminal());
        assert!(exec.finished_at.is_some());
    }
}

#[tokio::test]
async fn test_concurrent_double_kill_single_winner() {
    for _ in 0..50 {
        let store = InMemoryJobStore::new();
        let id = running_job(&store).await;

        let a_store = store.clone();
        let b_store = store.clone();
        let a = tokio::spawn(async move { a_store.kill(id, None).await.unwrap() });
        let b = tokio::spawn(async move { b_store.kill(id, None).await.unwrap() });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!([a.applied(), b.applied()].iter().filter(|x| **x).count(), 1);
        assert_eq!(store.status(id).await.unwrap(), JobStatus::Killed);
    }
}

#[tokio::test]
async fn test_unknown_job_reports_not_found() {
    let store = InMemoryJobStore::new();
    let id = Uuid::new_v4();
    assert!(matches!(
        store.status(id).await.unwrap_err(),
        fedjob::FedjobError::JobNotFound(_)
    ));
    assert!(store.kill(id, None).await.is_err());
}

#[tokio::test]
async fn test_running_counts_reflect_transitions() {
    let store = InMemoryJobStore::new();
    let a = running_job(&store).await;
    let _b = running_job(&store).await;

    let count = store
        .count_jobs("host", JobStatus::Running, None, None)
        .await
        .unwrap();
    assert_eq!(count, 2);

    store
        .finish(a, JobStatus::Succeeded, Some(0), None, None, None)
        .await
        .unwrap();
    let count = store
        .count_jobs("host", JobStatus::Running, None, None)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
