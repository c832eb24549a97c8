//! Then steps for dispatch BDD scenarios.

use super::world::{DispatchWorld, run_async};
use kiln::builder::{
    domain::{Builder, BuilderName},
    ports::BuilderRepository,
};
use kiln::task::{
    domain::{Task, TaskStatus},
    ports::TaskRepository,
};
use rstest_bdd_macros::then;

fn stored_tasks(world: &DispatchWorld) -> Result<Vec<Task>, eyre::Report> {
    world
        .created_tasks
        .iter()
        .map(|id| {
            run_async(world.store.find_task(*id))?
                .ok_or_else(|| eyre::eyre!("task {id} disappeared"))
        })
        .collect()
}

fn find_builder(world: &DispatchWorld, name: &str) -> Result<Builder, eyre::Report> {
    let builder_name = BuilderName::new(name)?;
    run_async(world.store.find_by_name(&builder_name))?
        .ok_or_else(|| eyre::eyre!("builder '{name}' not found"))
}

#[then(r#"builder "{name}" receives the task"#)]
fn receives_the_task(world: &mut DispatchWorld, name: String) -> Result<(), eyre::Report> {
    let response = world
        .last_responses
        .get(&name)
        .ok_or_else(|| eyre::eyre!("builder '{name}' sent no heartbeat"))?;
    let work = response
        .assigned_work()
        .ok_or_else(|| eyre::eyre!("expected a task, got {response:?}"))?;
    eyre::ensure!(work.task.id == world.first_task()?, "delivered the wrong task");
    Ok(())
}

#[then(r#"builder "{name}" receives no task"#)]
fn receives_no_task(world: &mut DispatchWorld, name: String) -> Result<(), eyre::Report> {
    let response = world
        .last_responses
        .get(&name)
        .ok_or_else(|| eyre::eyre!("builder '{name}' sent no heartbeat"))?;
    eyre::ensure!(
        response.status_code() == 204,
        "expected no content, got {response:?}"
    );
    Ok(())
}

#[then(r#"{count:usize} task is "{status}""#)]
fn count_tasks_in_status(
    world: &mut DispatchWorld,
    count: usize,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())?;
    let found = stored_tasks(world)?
        .iter()
        .filter(|task| task.status() == expected)
        .count();
    eyre::ensure!(found == count, "expected {count} {status} tasks, found {found}");
    Ok(())
}

#[then(r#"the first task is held by builder "{name}""#)]
fn first_task_held_by(world: &mut DispatchWorld, name: String) -> Result<(), eyre::Report> {
    let builder = find_builder(world, &name)?;
    let task = run_async(world.store.find_task(world.first_task()?))?
        .ok_or_else(|| eyre::eyre!("first task disappeared"))?;
    eyre::ensure!(
        task.assigned_builder() == Some(builder.id()),
        "first task is held by {:?}",
        task.assigned_builder()
    );
    Ok(())
}

#[then(r#"the first task is "{status}""#)]
fn first_task_status(world: &mut DispatchWorld, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())?;
    let task = run_async(world.store.find_task(world.first_task()?))?
        .ok_or_else(|| eyre::eyre!("first task disappeared"))?;
    eyre::ensure!(
        task.status() == expected,
        "expected {expected}, found {}",
        task.status()
    );
    Ok(())
}

#[then(r#"builder "{name}" is idle without a task"#)]
fn idle_without_task(world: &mut DispatchWorld, name: String) -> Result<(), eyre::Report> {
    let builder = find_builder(world, &name)?;
    eyre::ensure!(builder.assigned_task().is_none(), "builder still holds a task");
    eyre::ensure!(builder.is_idle(), "builder is not idle");
    Ok(())
}

#[then("the request fails because no builder can serve it")]
fn request_fails_unserved(world: &mut DispatchWorld) -> Result<(), eyre::Report> {
    let err = world
        .last_create_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("task request unexpectedly succeeded"))?;
    eyre::ensure!(
        err.is_no_suitable_capability(),
        "expected no suitable capability, got {err}"
    );
    Ok(())
}

#[then(r#"builder "{name}" holds no task"#)]
fn holds_no_task(world: &mut DispatchWorld, name: String) -> Result<(), eyre::Report> {
    let builder = find_builder(world, &name)?;
    eyre::ensure!(builder.assigned_task().is_none(), "builder holds a task");
    Ok(())
}
