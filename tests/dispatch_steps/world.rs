//! Shared world state for dispatch BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::TimeDelta;
use kiln::builder::services::BuilderRegistryService;
use kiln::config::{CoordinatorConfig, ProjectConfig};
use kiln::dispatch::{
    domain::BuilderResponse,
    services::{AssignmentScheduler, HeartbeatService},
};
use kiln::store::InMemoryStore;
use kiln::task::{
    adapters::{InMemoryArtifactStore, StaticCommitResolver},
    domain::{
        CommitId, PersistedTaskData, PosterId, Task, TaskId, TaskRequirements, TaskStatus,
    },
    services::{TaskLifecycleError, TaskLifecycleService},
};
use mockable::{Clock, DefaultClock};
use rstest::fixture;

/// Lifecycle service type used by the BDD world.
pub type TestLifecycle =
    TaskLifecycleService<InMemoryStore, StaticCommitResolver, InMemoryArtifactStore, DefaultClock>;

/// Scenario world for dispatch behaviour tests.
pub struct DispatchWorld {
    /// Shared store.
    pub store: Arc<InMemoryStore>,
    /// Builder administration.
    pub builders: BuilderRegistryService<InMemoryStore, DefaultClock>,
    /// Task creation.
    pub tasks: TestLifecycle,
    /// Builder request handling.
    pub heartbeats: HeartbeatService<InMemoryStore, InMemoryArtifactStore, DefaultClock>,
    /// Assignment scheduler.
    pub scheduler: AssignmentScheduler<InMemoryStore, DefaultClock>,
    /// Plaintext tokens by builder name.
    pub tokens: HashMap<String, String>,
    /// Tasks stored by the scenario, oldest first.
    pub created_tasks: Vec<TaskId>,
    /// Last heartbeat response per builder name.
    pub last_responses: HashMap<String, BuilderResponse>,
    /// Error from the last task request.
    pub last_create_error: Option<TaskLifecycleError>,
}

impl DispatchWorld {
    /// Creates a world over an empty store.
    #[must_use]
    pub fn new() -> Self {
        let config = CoordinatorConfig {
            project: ProjectConfig {
                pack_root: "kiln".to_owned(),
                pack_formats: vec!["tar.gz".to_owned()],
                ..ProjectConfig::default()
            },
            ..CoordinatorConfig::default()
        };
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(DefaultClock);
        let artifacts = Arc::new(InMemoryArtifactStore::new("kiln"));
        Self {
            builders: BuilderRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            tasks: TaskLifecycleService::new(
                Arc::clone(&store),
                Arc::new(StaticCommitResolver::new()),
                Arc::clone(&artifacts),
                Arc::clone(&clock),
                &config,
            ),
            heartbeats: HeartbeatService::new(
                Arc::clone(&store),
                artifacts,
                Arc::clone(&clock),
                &config,
            ),
            scheduler: AssignmentScheduler::new(Arc::clone(&store), clock, &config),
            store,
            tokens: HashMap::new(),
            created_tasks: Vec::new(),
            last_responses: HashMap::new(),
            last_create_error: None,
        }
    }

    /// Returns the token of a builder registered by the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no builder with `name` was registered.
    pub fn token(&self, name: &str) -> Result<String, eyre::Report> {
        self.tokens
            .get(name)
            .cloned()
            .ok_or_else(|| eyre::eyre!("builder '{name}' was not registered in this scenario"))
    }

    /// Returns the first task the scenario stored.
    ///
    /// # Errors
    ///
    /// Returns an error when no task was stored.
    pub fn first_task(&self) -> Result<TaskId, eyre::Report> {
        self.created_tasks
            .first()
            .copied()
            .ok_or_else(|| eyre::eyre!("no task stored in scenario world"))
    }

    /// Builds a pending task whose creation time follows every earlier
    /// scenario task, so "oldest" is deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error when `platform` is not `os/arch`.
    pub fn next_task(&self, platform: &str) -> Result<Task, eyre::Report> {
        let (os, arch) = split_platform(platform)?;
        let sequence = self.created_tasks.len() + 1;
        let created_at = DefaultClock.utc() - TimeDelta::minutes(10)
            + TimeDelta::seconds(i64::try_from(sequence)?);
        Ok(Task::from_persisted(PersistedTaskData {
            id: TaskId::new(),
            requirements: TaskRequirements::parse(os, arch, Vec::<String>::new())?,
            commit: CommitId::new(format!("{sequence:040x}"))?,
            status: TaskStatus::Pending,
            poster: PosterId::from_uuid(uuid::Uuid::new_v4()),
            assigned_builder: None,
            last_builder: None,
            created_at,
            updated_at: created_at,
        }))
    }
}

impl Default for DispatchWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> DispatchWorld {
    DispatchWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Splits `os/arch` into its parts.
///
/// # Errors
///
/// Returns an error when the value has no `/`.
pub fn split_platform(platform: &str) -> Result<(&str, &str), eyre::Report> {
    platform
        .split_once('/')
        .ok_or_else(|| eyre::eyre!("platform '{platform}' is not os/arch"))
}
