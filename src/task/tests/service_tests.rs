//! Task lifecycle service tests.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use mockable::{Clock, DefaultClock};
use rstest::{fixture, rstest};

use crate::builder::domain::{Builder, BuilderName, BuilderToken};
use crate::builder::ports::BuilderRepository;
use crate::config::{BatchTarget, CoordinatorConfig, ProjectConfig};
use crate::matrix::domain::CapabilityDeclaration;
use crate::matrix::services::CapabilityRegistry;
use crate::store::InMemoryStore;
use crate::task::{
    adapters::InMemoryArtifactStore,
    domain::{ArtifactFormat, BranchName, BuildOutcome, CommitId, PosterId, TaskId, TaskStatus},
    ports::{CommitResolutionError, CommitResolver, TaskRepository},
    services::{CreateTaskRequest, TaskCreation, TaskLifecycleError, TaskLifecycleService},
};

mock! {
    pub Resolver {}

    #[async_trait]
    impl CommitResolver for Resolver {
        async fn resolve(&self, branch: &BranchName) -> Result<CommitId, CommitResolutionError>;
    }
}

const HEAD: &str = "0123456789abcdef0123456789abcdef01234567";

type Service = TaskLifecycleService<InMemoryStore, MockResolver, InMemoryArtifactStore, DefaultClock>;

fn config() -> CoordinatorConfig {
    CoordinatorConfig {
        project: ProjectConfig {
            name: "kiln".to_owned(),
            commit_url_template: "https://example.com/kiln/commit/{{ sha }}".to_owned(),
            pack_root: "kiln".to_owned(),
            pack_formats: vec!["tar.gz".to_owned(), "zip".to_owned()],
            ..ProjectConfig::default()
        },
        batch: vec![
            BatchTarget {
                os: "linux".to_owned(),
                arch: "amd64".to_owned(),
                tags: Vec::new(),
            },
            BatchTarget {
                os: "windows".to_owned(),
                arch: "arm64".to_owned(),
                tags: Vec::new(),
            },
        ],
        ..CoordinatorConfig::default()
    }
}

fn resolving_head(times: usize) -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(times)
        .returning(|_| Ok(CommitId::new(HEAD).expect("valid commit")));
    resolver
}

struct Harness {
    store: Arc<InMemoryStore>,
    artifacts: Arc<InMemoryArtifactStore>,
}

impl Harness {
    fn service(&self, resolver: MockResolver) -> Service {
        self.service_with(resolver, Arc::clone(&self.artifacts))
    }

    fn service_with(&self, resolver: MockResolver, artifacts: Arc<InMemoryArtifactStore>) -> Service {
        TaskLifecycleService::new(
            Arc::clone(&self.store),
            Arc::new(resolver),
            artifacts,
            Arc::new(DefaultClock),
            &config(),
        )
    }

    async fn linux_builder(&self) -> Builder {
        let builder = Builder::new(
            BuilderName::new("linux-box").expect("valid name"),
            &BuilderToken::generate(),
            &DefaultClock,
        );
        self.store
            .register(&builder)
            .await
            .expect("registration should succeed");
        CapabilityRegistry::new(Arc::clone(&self.store))
            .replace_capabilities(
                builder.id(),
                vec![CapabilityDeclaration::new("linux", ["amd64", "386"], Vec::<String>::new())],
            )
            .await
            .expect("capabilities should be stored");
        builder
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        store: Arc::new(InMemoryStore::new()),
        artifacts: Arc::new(InMemoryArtifactStore::new("kiln")),
    }
}

fn poster() -> PosterId {
    PosterId::from_uuid(uuid::Uuid::new_v4())
}

fn linux_request() -> CreateTaskRequest {
    CreateTaskRequest::new(poster(), "linux", "amd64", "main")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_stores_pending_task(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(1));

    let creation = service
        .create(linux_request())
        .await
        .expect("task creation should succeed");

    let TaskCreation::Created(task) = creation else {
        panic!("expected a new task");
    };
    assert_eq!(task.status(), TaskStatus::Pending);
    assert_eq!(task.commit().as_str(), HEAD);
    assert_eq!(task.assigned_builder(), None);
    let stored = service
        .find_by_id(task.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored, Some(task));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_reuses_equivalent_task(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(2));

    let first = service
        .create(linux_request())
        .await
        .expect("first creation should succeed");
    let second = service
        .create(linux_request())
        .await
        .expect("second creation should succeed");

    assert!(!first.is_reused());
    assert!(second.is_reused());
    assert_eq!(first.task().id(), second.task().id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_task_is_not_reused(harness: Harness) {
    let builder = harness.linux_builder().await;
    let service = harness.service(resolving_head(2));
    let mut failed = service
        .create(linux_request())
        .await
        .expect("creation should succeed")
        .into_task();
    let now = DefaultClock.utc();
    failed.assign(builder.id(), now).expect("assignment");
    harness
        .store
        .update_status(&failed, TaskStatus::Pending)
        .await
        .expect("status update");
    failed
        .finish(builder.id(), BuildOutcome::Failed, now)
        .expect("finish");
    harness
        .store
        .update_status(&failed, TaskStatus::Building)
        .await
        .expect("status update");

    let retry = service
        .create(linux_request())
        .await
        .expect("retry should succeed");

    assert!(!retry.is_reused());
    assert_ne!(retry.task().id(), failed.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unserved_platform_is_rejected_before_resolving(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(0));

    let err = service
        .create(CreateTaskRequest::new(poster(), "windows", "arm64", "main"))
        .await
        .expect_err("no builder serves windows/arm64");

    assert!(err.is_no_suitable_capability());
    let recent = service.list_recent(0, 10).await.expect("listing should succeed");
    assert!(recent.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsatisfied_tag_is_rejected(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(0));

    let err = service
        .create(linux_request().with_tags(["cgo"]))
        .await
        .expect_err("no builder offers cgo");

    assert!(err.is_no_suitable_capability());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_branch_is_reported(harness: Harness) {
    harness.linux_builder().await;
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|branch| Err(CommitResolutionError::BranchNotFound(branch.clone())));
    let service = harness.service(resolver);

    let err = service
        .create(linux_request())
        .await
        .expect_err("branch does not exist");

    assert!(matches!(
        err,
        TaskLifecycleError::CommitResolution(CommitResolutionError::BranchNotFound(_))
    ));
}

#[rstest]
#[case::blank_os("", "amd64", "main")]
#[case::blank_branch("linux", "amd64", " ")]
#[case::option_like_branch("linux", "amd64", "--upload-pack=evil")]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_request_is_a_domain_error(
    harness: Harness,
    #[case] os: &str,
    #[case] arch: &str,
    #[case] branch: &str,
) {
    let service = harness.service(resolving_head(0));

    let err = service
        .create(CreateTaskRequest::new(poster(), os, arch, branch))
        .await
        .expect_err("request is invalid");

    assert!(matches!(err, TaskLifecycleError::Domain(_)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_creates_served_targets_and_rejects_others(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(2));

    let first = service
        .create_batch(poster(), "main")
        .await
        .expect("batch should succeed");
    let second = service
        .create_batch(poster(), "main")
        .await
        .expect("batch should succeed");

    assert_eq!(first.created.len(), 1);
    assert!(first.reused.is_empty());
    assert_eq!(first.rejected.len(), 1);
    assert_eq!(first.rejected.first().map(|r| r.target.os.as_str()), Some("windows"));
    assert!(second.created.is_empty());
    assert_eq!(
        second.reused.iter().map(|task| task.id()).collect::<Vec<_>>(),
        first.created.iter().map(|task| task.id()).collect::<Vec<_>>()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn archive_rejects_unfinished_task(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(1));
    let task = service
        .create(linux_request())
        .await
        .expect("creation should succeed")
        .into_task();

    let err = service
        .archive(task.id())
        .await
        .expect_err("pending task cannot be archived");

    assert!(matches!(err, TaskLifecycleError::Domain(_)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn archive_unknown_task_is_not_found(harness: Harness) {
    let service = harness.service(resolving_head(0));
    let id = TaskId::new();

    let err = service.archive(id).await.expect_err("task does not exist");

    assert!(matches!(err, TaskLifecycleError::NotFound(missing) if missing == id));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn archive_deletes_artifacts_and_reports_failures(harness: Harness) {
    let builder = harness.linux_builder().await;
    let zip = ArtifactFormat::new("zip").expect("valid format");
    let tar = ArtifactFormat::new("tar.gz").expect("valid format");
    let artifacts = Arc::new(InMemoryArtifactStore::new("kiln").with_failing_removal(zip.clone()));
    let service = harness.service_with(resolving_head(1), Arc::clone(&artifacts));
    let mut task = service
        .create(linux_request())
        .await
        .expect("creation should succeed")
        .into_task();
    let now = DefaultClock.utc();
    task.assign(builder.id(), now).expect("assignment");
    task.finish(builder.id(), BuildOutcome::Succeeded, now)
        .expect("finish");
    harness
        .store
        .update_status(&task, TaskStatus::Pending)
        .await
        .expect("status update");
    artifacts.put(&task, &tar, b"tarball").expect("put tar");
    artifacts.put(&task, &zip, b"zipfile").expect("put zip");

    let report = service
        .archive(task.id())
        .await
        .expect("archive should succeed");

    assert_eq!(report.task.status(), TaskStatus::Archived);
    assert_eq!(report.cleanup_failures.len(), 1);
    assert_eq!(report.cleanup_failures.first().map(|f| &f.format), Some(&zip));
    assert_eq!(artifacts.contents(&task, &tar), None);
    assert_eq!(artifacts.contents(&task, &zip), Some(b"zipfile".to_vec()));
    let stored = service
        .find_by_id(task.id())
        .await
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.status(), TaskStatus::Archived);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn commit_url_uses_template(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(1));
    let task = service
        .create(linux_request())
        .await
        .expect("creation should succeed")
        .into_task();

    let url = service.commit_url(&task).expect("template renders");

    assert_eq!(url, format!("https://example.com/kiln/commit/{HEAD}"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_recent_pages_through_tasks(harness: Harness) {
    harness.linux_builder().await;
    let service = harness.service(resolving_head(2));
    service
        .create(linux_request())
        .await
        .expect("creation should succeed");
    service
        .create(CreateTaskRequest::new(poster(), "linux", "386", "main"))
        .await
        .expect("creation should succeed");

    let first_page = service.list_recent(0, 1).await.expect("listing");
    let second_page = service.list_recent(1, 1).await.expect("listing");
    let past_end = service.list_recent(2, 1).await.expect("listing");

    assert_eq!(first_page.len(), 1);
    assert_eq!(second_page.len(), 1);
    assert_ne!(
        first_page.first().map(|task| task.id()),
        second_page.first().map(|task| task.id())
    );
    assert!(past_end.is_empty());
}
