//! End-to-end coordinator flows over the in-memory store.

use kiln::dispatch::domain::WireStatus;
use kiln::matrix::domain::CapabilityDeclaration;
use kiln::task::{
    domain::{PosterId, TaskStatus},
    services::{CreateTaskRequest, TaskCreation},
};
use rstest::rstest;

use super::helpers::{Coordinator, MAIN_HEAD, coordinator};

fn poster() -> PosterId {
    PosterId::from_uuid(uuid::Uuid::new_v4())
}

fn linux(archs: &[&str]) -> Vec<CapabilityDeclaration> {
    vec![CapabilityDeclaration::new(
        "linux",
        archs.iter().copied(),
        Vec::<String>::new(),
    )]
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_travels_from_creation_to_archive(coordinator: Coordinator) -> Result<(), eyre::Report> {
    let token = coordinator.online_builder("linux-1", linux(&["amd64"])).await?;
    let TaskCreation::Created(task) = coordinator
        .tasks
        .create(CreateTaskRequest::new(poster(), "linux", "amd64", "main"))
        .await?
    else {
        eyre::bail!("expected a new task");
    };
    eyre::ensure!(task.commit().as_str() == MAIN_HEAD, "wrong commit resolved");

    let report = coordinator.scheduler.run_cycle().await?;
    eyre::ensure!(report.assigned.len() == 1, "task should be assigned");

    let response = coordinator.beat(&token, WireStatus::Idle).await?;
    let work = response
        .assigned_work()
        .ok_or_else(|| eyre::eyre!("idle heartbeat should deliver the task"))?;
    eyre::ensure!(work.task.id == task.id(), "delivered the wrong task");
    eyre::ensure!(work.task.commit == MAIN_HEAD, "delivered the wrong commit");

    coordinator.beat(&token, WireStatus::Building).await?;
    for format in ["tar.gz", "zip"] {
        coordinator
            .heartbeats
            .upload_artifact(&token, format, format.as_bytes())
            .await?;
    }
    coordinator.beat(&token, WireStatus::Succeeded).await?;

    let finished = coordinator
        .tasks
        .find_by_id(task.id())
        .await?
        .ok_or_else(|| eyre::eyre!("task disappeared"))?;
    eyre::ensure!(finished.status() == TaskStatus::Succeeded, "task should succeed");
    let zip_path = coordinator
        .artifact_dir
        .path()
        .join("kiln_c0ffee0123_linux_amd64.zip");
    eyre::ensure!(std::fs::read(&zip_path)? == b"zip", "zip artifact content");

    let archived = coordinator.tasks.archive(task.id()).await?;
    eyre::ensure!(archived.task.status() == TaskStatus::Archived, "task archived");
    eyre::ensure!(archived.cleanup_failures.is_empty(), "cleanup should succeed");
    eyre::ensure!(!zip_path.exists(), "artifact should be removed");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_creation_skips_unserved_targets(coordinator: Coordinator) -> Result<(), eyre::Report> {
    coordinator
        .online_builder("linux-multi", linux(&["amd64", "arm64"]))
        .await?;

    let report = coordinator.tasks.create_batch(poster(), "main").await?;

    eyre::ensure!(report.created.len() == 2, "two linux targets are served");
    eyre::ensure!(report.rejected.len() == 1, "darwin target has no builder");
    let cycle = coordinator.scheduler.run_cycle().await?;
    eyre::ensure!(cycle.assigned.len() == 1, "one builder takes one task");
    eyre::ensure!(cycle.awaiting_builder.len() == 1, "the other task waits");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_task_can_be_retried(coordinator: Coordinator) -> Result<(), eyre::Report> {
    let token = coordinator.online_builder("linux-1", linux(&["amd64"])).await?;
    let request = || CreateTaskRequest::new(poster(), "linux", "amd64", "main");
    let first = coordinator.tasks.create(request()).await?.into_task();
    coordinator.scheduler.run_cycle().await?;
    coordinator.beat(&token, WireStatus::Idle).await?;
    coordinator.beat(&token, WireStatus::Failed).await?;

    let retry = coordinator.tasks.create(request()).await?;

    eyre::ensure!(!retry.is_reused(), "failed tasks are not reused");
    eyre::ensure!(retry.task().id() != first.id(), "retry is a new task");
    let cycle = coordinator.scheduler.run_cycle().await?;
    eyre::ensure!(
        cycle.assigned.first().map(|a| a.task_id) == Some(retry.task().id()),
        "retry goes to the freed builder"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rotated_token_locks_out_old_token(coordinator: Coordinator) -> Result<(), eyre::Report> {
    let old_token = coordinator.online_builder("linux-1", linux(&["amd64"])).await?;
    let builder = coordinator
        .builders
        .find_by_name("linux-1")
        .await?
        .ok_or_else(|| eyre::eyre!("builder should exist"))?;

    let rotated = coordinator.builders.regenerate_token(builder.id()).await?;

    let old = coordinator.beat(&old_token, WireStatus::Idle).await?;
    let new = coordinator.beat(rotated.token.as_str(), WireStatus::Idle).await?;
    eyre::ensure!(old.status_code() == 403, "old token must be rejected");
    eyre::ensure!(new.status_code() == 204, "new token must be accepted");
    Ok(())
}
