//! Domain tests for task value types.

use crate::matrix::domain::MatrixDomainError;
use crate::task::domain::{
    ArtifactFormat, BranchName, CommitId, PosterId, Task, TaskDomainError, TaskRequirements,
    TaskStatus,
};
use mockable::DefaultClock;
use rstest::rstest;

const COMMIT: &str = "0123456789ABCDEF0123456789abcdef01234567";

fn task_for(os: &str, arch: &str, tags: &[&str]) -> Task {
    Task::new(
        PosterId::from_uuid(uuid::Uuid::new_v4()),
        TaskRequirements::parse(os, arch, tags.iter().copied()).expect("valid requirements"),
        CommitId::new(COMMIT).expect("valid commit"),
        &DefaultClock,
    )
}

#[rstest]
#[case("main")]
#[case("release/1.x")]
#[case("  feature-x  ")]
fn branch_name_accepts_valid_values(#[case] input: &str) {
    let branch = BranchName::new(input).expect("branch should be valid");
    assert_eq!(branch.as_str(), input.trim());
}

#[rstest]
#[case("")]
#[case("two words")]
#[case("-upload-pack")]
fn branch_name_rejects_invalid_values(#[case] input: &str) {
    assert!(matches!(
        BranchName::new(input),
        Err(TaskDomainError::InvalidBranchName(_))
    ));
}

#[rstest]
fn commit_id_is_lowercased_and_shortened() {
    let commit = CommitId::new(COMMIT).expect("valid commit");
    assert_eq!(commit.as_str(), COMMIT.to_ascii_lowercase());
    assert_eq!(commit.short(), "0123456789");
}

#[rstest]
#[case("abc123")]
#[case("g123456789abcdef0123456789abcdef01234567")]
fn commit_id_rejects_invalid_values(#[case] input: &str) {
    assert!(matches!(
        CommitId::new(input),
        Err(TaskDomainError::InvalidCommitId(_))
    ));
}

#[rstest]
fn commit_id_accepts_sha256_length() {
    assert!(CommitId::new("a".repeat(64)).is_ok());
}

#[rstest]
fn requirements_reject_invalid_platform() {
    assert_eq!(
        TaskRequirements::parse("", "amd64", Vec::<String>::new()),
        Err(TaskDomainError::Requirements(MatrixDomainError::EmptyOs))
    );
}

#[rstest]
#[case("zip", true)]
#[case("tar.gz", true)]
#[case(".zip", false)]
#[case("tar.", false)]
#[case("tar gz", false)]
fn artifact_format_validation(#[case] input: &str, #[case] valid: bool) {
    assert_eq!(ArtifactFormat::new(input).is_ok(), valid);
}

#[rstest]
fn artifact_name_includes_sorted_tags() {
    let task = task_for("linux", "amd64", &["static", "cgo"]);
    let format = ArtifactFormat::new("tar.gz").expect("valid format");

    assert_eq!(
        task.artifact_name("kiln", &format),
        "kiln_0123456789_linux_amd64_cgo_static.tar.gz"
    );
}

#[rstest]
fn artifact_name_without_tags() {
    let task = task_for("darwin", "arm64", &[]);
    let format = ArtifactFormat::new("zip").expect("valid format");

    assert_eq!(task.artifact_name("kiln", &format), "kiln_0123456789_darwin_arm64.zip");
}

#[rstest]
#[case("pending", TaskStatus::Pending)]
#[case("BUILDING", TaskStatus::Building)]
#[case("uploading", TaskStatus::Uploading)]
#[case("failed", TaskStatus::Failed)]
#[case("succeeded", TaskStatus::Succeeded)]
#[case("archived", TaskStatus::Archived)]
fn task_status_parses_storage_values(#[case] raw: &str, #[case] expected: TaskStatus) {
    assert_eq!(TaskStatus::try_from(raw), Ok(expected));
}

#[rstest]
fn task_status_rejects_unknown_value() {
    assert!(TaskStatus::try_from("queued").is_err());
}

#[rstest]
fn new_task_is_pending_without_builder() {
    let task = task_for("linux", "amd64", &[]);
    assert_eq!(task.status(), TaskStatus::Pending);
    assert_eq!(task.assigned_builder(), None);
    assert_eq!(task.last_builder(), None);
    assert_eq!(task.created_at(), task.updated_at());
}
