//! Heartbeat wire contract tests.

use mockable::DefaultClock;
use rstest::rstest;

use crate::config::ProjectConfig;
use crate::dispatch::domain::{
    AssignedWork, BuilderResponse, HeartbeatRequest, ParseWireStatusError, ProtocolError,
    WireStatus,
};
use crate::task::domain::{CommitId, PosterId, Task, TaskId, TaskRequirements};

#[rstest]
#[case("IDLE", WireStatus::Idle)]
#[case("building", WireStatus::Building)]
#[case(" Uploading ", WireStatus::Uploading)]
#[case("FAILED", WireStatus::Failed)]
#[case("SUCCEEDED", WireStatus::Succeeded)]
fn wire_status_parses_case_insensitively(#[case] raw: &str, #[case] expected: WireStatus) {
    assert_eq!(WireStatus::try_from(raw), Ok(expected));
}

#[rstest]
fn unknown_wire_status_is_rejected() {
    assert_eq!(
        WireStatus::try_from("DONE"),
        Err(ParseWireStatusError("DONE".to_owned()))
    );
}

#[rstest]
fn wire_status_serializes_in_upper_case() {
    let json = serde_json::to_string(&WireStatus::Succeeded).expect("serialize");
    assert_eq!(json, "\"SUCCEEDED\"");
}

#[rstest]
fn from_wire_parses_complete_request() {
    let task_id = TaskId::new();
    let raw_task = task_id.to_string();

    let request = HeartbeatRequest::from_wire(
        Some("bearer  s3cret "),
        Some("uploading"),
        Some(raw_task.as_str()),
    )
    .expect("request should parse");

    assert_eq!(request.token(), "s3cret");
    assert_eq!(request.status(), WireStatus::Uploading);
    assert_eq!(request.task_id(), Some(task_id));
}

#[rstest]
fn from_wire_treats_blank_task_as_absent() {
    let request = HeartbeatRequest::from_wire(Some("Bearer token"), Some("IDLE"), Some("  "))
        .expect("request should parse");

    assert_eq!(request.task_id(), None);
}

#[rstest]
#[case::no_header(None, Some("IDLE"), None, ProtocolError::MissingToken)]
#[case::empty_token(Some("Bearer   "), Some("IDLE"), None, ProtocolError::MissingToken)]
#[case::basic_auth(Some("Basic abc"), Some("IDLE"), None, ProtocolError::MalformedAuthorization)]
#[case::bare_token(Some("abc"), Some("IDLE"), None, ProtocolError::MalformedAuthorization)]
#[case::no_status(Some("Bearer abc"), None, None, ProtocolError::MissingStatus)]
#[case::bad_task(
    Some("Bearer abc"),
    Some("FAILED"),
    Some("task-7"),
    ProtocolError::InvalidTaskId("task-7".to_owned())
)]
fn from_wire_rejects_malformed_requests(
    #[case] authorization: Option<&str>,
    #[case] status: Option<&str>,
    #[case] task: Option<&str>,
    #[case] expected: ProtocolError,
) {
    assert_eq!(
        HeartbeatRequest::from_wire(authorization, status, task),
        Err(expected)
    );
}

#[rstest]
fn protocol_errors_map_to_status_codes() {
    assert_eq!(ProtocolError::MissingToken.status_code(), 403);
    assert_eq!(ProtocolError::MalformedAuthorization.status_code(), 403);
    assert_eq!(ProtocolError::MissingStatus.status_code(), 400);
    assert_eq!(
        ProtocolError::UnknownStatus(ParseWireStatusError("X".to_owned())).status_code(),
        400
    );
}

#[rstest]
fn assigned_work_carries_task_and_packing_settings() {
    let task = Task::new(
        PosterId::from_uuid(uuid::Uuid::new_v4()),
        TaskRequirements::parse("darwin", "arm64", ["netgo", "cgo"]).expect("valid requirements"),
        CommitId::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").expect("valid commit"),
        &DefaultClock,
    );
    let project = ProjectConfig {
        import_path: "example.com/kiln".to_owned(),
        pack_root: "kiln".to_owned(),
        pack_entries: vec!["kiln".to_owned()],
        pack_formats: vec!["zip".to_owned()],
        ..ProjectConfig::default()
    };

    let work = AssignedWork::new(&task, &project);
    let response = BuilderResponse::Assigned(Box::new(work.clone()));

    assert_eq!(work.task.id, task.id());
    assert_eq!(work.task.os, "darwin");
    assert_eq!(work.task.arch, "arm64");
    assert_eq!(work.task.tags, vec!["cgo".to_owned(), "netgo".to_owned()]);
    assert_eq!(work.task.commit, "abcdef0123456789abcdef0123456789abcdef01");
    assert_eq!(work.import_path, "example.com/kiln");
    assert_eq!(work.pack_formats, vec!["zip".to_owned()]);
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.assigned_work(), Some(&work));
}

#[rstest]
fn plain_responses_have_no_payload() {
    assert_eq!(BuilderResponse::NoContent.status_code(), 204);
    assert_eq!(BuilderResponse::Forbidden.status_code(), 403);
    assert!(BuilderResponse::NoContent.assigned_work().is_none());
}
