//! When steps for dispatch BDD scenarios.

use super::world::{DispatchWorld, run_async, split_platform};
use eyre::WrapErr;
use kiln::dispatch::domain::{HeartbeatRequest, WireStatus};
use kiln::task::{domain::PosterId, services::CreateTaskRequest};
use rstest_bdd_macros::when;

#[when("the scheduler runs a cycle")]
fn scheduler_runs(world: &mut DispatchWorld) -> Result<(), eyre::Report> {
    run_async(world.scheduler.run_cycle()).wrap_err("run assignment cycle")?;
    Ok(())
}

fn send(
    world: &mut DispatchWorld,
    name: String,
    request: HeartbeatRequest,
) -> Result<(), eyre::Report> {
    let response = run_async(world.heartbeats.heartbeat(request)).wrap_err("send heartbeat")?;
    world.last_responses.insert(name, response);
    Ok(())
}

#[when(r#"builder "{name}" sends an "{status}" heartbeat"#)]
fn sends_an_heartbeat(
    world: &mut DispatchWorld,
    name: String,
    status: String,
) -> Result<(), eyre::Report> {
    let token = world.token(&name)?;
    let request = HeartbeatRequest::new(token, WireStatus::try_from(status.as_str())?);
    send(world, name, request)
}

#[when(r#"builder "{name}" sends a "{status}" heartbeat"#)]
fn sends_a_heartbeat(
    world: &mut DispatchWorld,
    name: String,
    status: String,
) -> Result<(), eyre::Report> {
    sends_an_heartbeat(world, name, status)
}

#[when(r#"builder "{name}" reports "{status}" for the first task"#)]
fn reports_for_first_task(
    world: &mut DispatchWorld,
    name: String,
    status: String,
) -> Result<(), eyre::Report> {
    let token = world.token(&name)?;
    let request = HeartbeatRequest::new(token, WireStatus::try_from(status.as_str())?)
        .with_task(world.first_task()?);
    send(world, name, request)
}

#[when(r#"a task is requested for "{platform}""#)]
fn task_requested(world: &mut DispatchWorld, platform: String) -> Result<(), eyre::Report> {
    let (os, arch) = split_platform(&platform)?;
    let request = CreateTaskRequest::new(
        PosterId::from_uuid(uuid::Uuid::new_v4()),
        os,
        arch,
        "main",
    );
    world.last_create_error = run_async(world.tasks.create(request)).err();
    Ok(())
}
