//! Given steps for dispatch BDD scenarios.

use super::world::{DispatchWorld, run_async, split_platform};
use eyre::WrapErr;
use kiln::builder::services::RegisterBuilderRequest;
use kiln::dispatch::domain::{BuilderResponse, HeartbeatRequest, WireStatus};
use kiln::matrix::domain::CapabilityDeclaration;
use kiln::task::ports::{TaskInsertion, TaskRepository};
use rstest_bdd_macros::given;

#[given(r#"an idle builder "{name}" offering "{platform}""#)]
fn idle_builder_offering(
    world: &mut DispatchWorld,
    name: String,
    platform: String,
) -> Result<(), eyre::Report> {
    let (os, arch) = split_platform(&platform)?;
    let registered = run_async(world.builders.register(RegisterBuilderRequest::new(name.as_str())))
        .wrap_err("register builder")?;
    let token = registered.token.as_str().to_owned();

    run_async(world.heartbeats.update_capabilities(
        &token,
        vec![CapabilityDeclaration::new(os, [arch], Vec::<String>::new())],
    ))
    .wrap_err("declare capabilities")?;
    let response = run_async(
        world
            .heartbeats
            .heartbeat(HeartbeatRequest::new(token.as_str(), WireStatus::Idle)),
    )
    .wrap_err("check in")?;
    eyre::ensure!(
        response == BuilderResponse::NoContent,
        "unexpected check-in response {response:?}"
    );

    world.tokens.insert(name, token);
    Ok(())
}

#[given(r#"a pending task for "{platform}""#)]
fn pending_task_for(world: &mut DispatchWorld, platform: String) -> Result<(), eyre::Report> {
    let task = world.next_task(&platform)?;
    let insertion = run_async(world.store.store_or_reuse(&task)).wrap_err("store task")?;
    eyre::ensure!(insertion == TaskInsertion::Stored, "task unexpectedly reused");
    world.created_tasks.push(task.id());
    Ok(())
}
