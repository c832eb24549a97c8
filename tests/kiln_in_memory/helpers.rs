//! Shared wiring for in-memory coordinator integration tests.

use std::sync::Arc;

use kiln::builder::services::{BuilderRegistryService, RegisterBuilderRequest};
use kiln::config::CoordinatorConfig;
use kiln::dispatch::{
    domain::{BuilderResponse, HeartbeatRequest, WireStatus},
    services::{AssignmentScheduler, HeartbeatService},
};
use kiln::matrix::domain::CapabilityDeclaration;
use kiln::store::InMemoryStore;
use kiln::task::{
    adapters::{DirArtifactStore, StaticCommitResolver},
    domain::{BranchName, CommitId},
    services::TaskLifecycleService,
};
use mockable::DefaultClock;
use rstest::fixture;
use tempfile::TempDir;

/// Head of `main` known to the static resolver.
pub const MAIN_HEAD: &str = "c0ffee0123456789abcdef0123456789abcdef01";

/// Configuration document used by every integration test.
pub const CONFIG: &str = r#"{
    "scheduler": { "interval_secs": 30 },
    "liveness": { "heartbeat_interval_secs": 60 },
    "project": {
        "name": "kiln",
        "clone_url": "https://example.com/kiln.git",
        "commit_url_template": "https://example.com/kiln/commit/{{ sha }}",
        "import_path": "example.com/kiln",
        "branches": ["main"],
        "pack_root": "kiln",
        "pack_entries": ["kiln", "README.md"],
        "pack_formats": ["tar.gz", "zip"]
    },
    "batch": [
        { "os": "linux", "arch": "amd64" },
        { "os": "linux", "arch": "arm64" },
        { "os": "darwin", "arch": "arm64", "tags": ["cgo"] }
    ]
}"#;

/// Lifecycle service type used by the coordinator.
pub type Lifecycle =
    TaskLifecycleService<InMemoryStore, StaticCommitResolver, DirArtifactStore, DefaultClock>;

/// Every coordinator service wired to one store and artifact directory.
pub struct Coordinator {
    /// Builder administration.
    pub builders: BuilderRegistryService<InMemoryStore, DefaultClock>,
    /// Task creation and archival.
    pub tasks: Lifecycle,
    /// Builder request handling.
    pub heartbeats: HeartbeatService<InMemoryStore, DirArtifactStore, DefaultClock>,
    /// Assignment scheduler.
    pub scheduler: AssignmentScheduler<InMemoryStore, DefaultClock>,
    /// Directory holding uploaded artifacts.
    pub artifact_dir: TempDir,
}

/// Builds a coordinator over an empty store.
///
/// # Errors
///
/// Returns an error when the configuration or artifact directory cannot be
/// set up.
pub fn build_coordinator() -> Result<Coordinator, eyre::Report> {
    let config = CoordinatorConfig::from_json_str(CONFIG)?;
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(DefaultClock);
    let artifact_dir = TempDir::new()?;
    let artifacts = Arc::new(DirArtifactStore::open(
        artifact_dir.path(),
        config.project.pack_root.as_str(),
    )?);
    let resolver = StaticCommitResolver::new().with_branch(
        BranchName::new("main")?,
        CommitId::new(MAIN_HEAD)?,
    );

    Ok(Coordinator {
        builders: BuilderRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
        tasks: TaskLifecycleService::new(
            Arc::clone(&store),
            Arc::new(resolver),
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
        scheduler: AssignmentScheduler::new(store, clock, &config),
        artifact_dir,
    })
}

/// Provides a fresh coordinator.
#[fixture]
pub fn coordinator() -> Coordinator {
    build_coordinator().expect("coordinator should build")
}

impl Coordinator {
    /// Registers a builder, declares its capabilities and checks it in.
    ///
    /// # Errors
    ///
    /// Returns an error when any step fails.
    pub async fn online_builder(
        &self,
        name: &str,
        declarations: Vec<CapabilityDeclaration>,
    ) -> Result<String, eyre::Report> {
        let registered = self.builders.register(RegisterBuilderRequest::new(name)).await?;
        let token = registered.token.as_str().to_owned();
        self.heartbeats
            .update_capabilities(&token, declarations)
            .await?;
        let response = self
            .heartbeats
            .heartbeat(HeartbeatRequest::new(token.as_str(), WireStatus::Idle))
            .await?;
        eyre::ensure!(
            response == BuilderResponse::NoContent,
            "unexpected check-in response {response:?}"
        );
        Ok(token)
    }

    /// Sends one heartbeat.
    ///
    /// # Errors
    ///
    /// Returns an error when the heartbeat fails.
    pub async fn beat(&self, token: &str, status: WireStatus) -> Result<BuilderResponse, eyre::Report> {
        Ok(self
            .heartbeats
            .heartbeat(HeartbeatRequest::new(token, status))
            .await?)
    }
}
