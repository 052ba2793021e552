use delivery_model::{
    ArtifactRepo, ArtifactStatus, InMemoryStore, Principal, ProjectId, ProjectRepo, ProjectStatus,
    Role,
};
use delivery_server::{routes, AppState, Envelope};
use delivery_sync::{IssueTracker, SignatureValidator};
use delivery_test_utils::{
    connected_project, draft_artifact, github_repository, numbered_issues, principal, project_in,
    ticket_in, FakeTracker, REPO_ID,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

const SECRET: &str = "whsec-api-test";

struct Harness {
    store: Arc<InMemoryStore>,
    state: AppState,
}

impl Harness {
    fn new() -> Self {
        Self::with_tracker(FakeTracker::new())
    }

    fn with_tracker(tracker: FakeTracker) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let tracker: Arc<dyn IssueTracker> = Arc::new(tracker);
        let state = AppState::new(store.clone(), tracker, SecretString::from(SECRET));
        Self { store, state }
    }

    fn api(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        routes(self.state.clone(), &[])
    }

    async fn post(&self, path: &str, caller: &Principal, body: Value) -> (StatusCode, Envelope) {
        let response = warp::test::request()
            .method("POST")
            .path(path)
            .header("x-user-id", caller.user_id.to_string())
            .header("x-user-role", caller.role.as_str())
            .header("user-agent", "api-tests/1.0")
            .json(&body)
            .reply(&self.api())
            .await;
        (response.status(), serde_json::from_slice(response.body()).unwrap())
    }
}

fn error_code(envelope: &Envelope) -> &str {
    envelope.error.as_ref().map(|e| e.code.as_str()).unwrap_or("<none>")
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new();
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&harness.api())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_invalid_transition_lists_allowed() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::Draft).await;

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &principal(Role::ProjectManager),
            json!({ "action": "transition", "projectId": project.id, "targetStatus": "poc_phase" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!envelope.success);
    let error = envelope.error.unwrap();
    assert_eq!(error.code, "INVALID_TRANSITION");
    assert!(error.message.contains(r#"["scoping","cancelled"]"#), "{}", error.message);
    assert_eq!(
        error.details.unwrap()["allowed"],
        json!(["scoping", "cancelled"])
    );
}

#[tokio::test]
async fn test_transition_and_available_transitions() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::Draft).await;
    let pm = principal(Role::ProjectManager);

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &pm,
            json!({ "action": "transition", "projectId": project.id, "targetStatus": "scoping" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = envelope.data.unwrap();
    assert_eq!(data["previousStatus"], "draft");
    assert_eq!(data["status"], "scoping");

    let (_, envelope) = harness
        .post(
            "/api/workflow",
            &pm,
            json!({ "action": "availableTransitions", "projectId": project.id }),
        )
        .await;
    assert_eq!(
        envelope.data.unwrap()["allowed"],
        json!(["sow_draft", "cancelled"])
    );
    let stored = harness.store.project(project.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProjectStatus::Scoping);
}

#[tokio::test]
async fn test_missing_identity_is_unauthenticated() {
    let harness = Harness::new();
    let response = warp::test::request()
        .method("POST")
        .path("/api/workflow")
        .json(&json!({ "action": "availableTransitions", "projectId": ProjectId::new() }))
        .reply(&harness.api())
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let envelope: Envelope = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(error_code(&envelope), "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn test_role_gate_is_forbidden() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::SowDraft).await;

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &principal(Role::Developer),
            json!({
                "action": "transition",
                "projectId": project.id,
                "targetStatus": "sow_review"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&envelope), "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_malformed_body_is_validation() {
    let harness = Harness::new();
    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &principal(Role::ProjectManager),
            json!({ "action": "archiveEverything" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&envelope), "VALIDATION_ERROR");
    assert!(!envelope.request_id.is_nil());
}

#[tokio::test]
async fn test_two_approver_round_over_http() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::SowReview).await;
    let artifact = draft_artifact(&harness.store, &project).await;
    let alice = principal(Role::ClientAdmin);
    let bob = principal(Role::Client);

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &principal(Role::ProjectManager),
            json!({
                "action": "requestSignoff",
                "artifactId": artifact.id,
                "approverIds": [alice.user_id, bob.user_id]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{envelope:?}");
    let ids = envelope.data.unwrap()["signoffIds"].clone();
    let (alice_signoff, bob_signoff) = (ids[0].clone(), ids[1].clone());

    let (_, envelope) = harness
        .post(
            "/api/workflow",
            &alice,
            json!({ "action": "approve", "signoffId": alice_signoff }),
        )
        .await;
    assert_eq!(envelope.data.unwrap()["artifactStatus"], "pending_review");

    let (_, envelope) = harness
        .post(
            "/api/workflow",
            &bob,
            json!({ "action": "approve", "signoffId": bob_signoff, "comments": "ship it" }),
        )
        .await;
    assert_eq!(envelope.data.unwrap()["artifactStatus"], "approved");

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &bob,
            json!({ "action": "approve", "signoffId": bob_signoff }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&envelope), "CONFLICT");
}

#[tokio::test]
async fn test_reject_requires_comments() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::SowReview).await;
    let artifact = draft_artifact(&harness.store, &project).await;
    let client = principal(Role::Client);

    let (_, envelope) = harness
        .post(
            "/api/workflow",
            &principal(Role::TechLead),
            json!({
                "action": "requestSignoff",
                "artifactId": artifact.id,
                "approverIds": [client.user_id]
            }),
        )
        .await;
    let signoff = envelope.data.unwrap()["signoffIds"][0].clone();

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &client,
            json!({ "action": "reject", "signoffId": signoff, "comments": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&envelope), "VALIDATION_ERROR");
    let stored = harness.store.artifact(artifact.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ArtifactStatus::PendingReview);

    let (status, envelope) = harness
        .post(
            "/api/workflow",
            &client,
            json!({
                "action": "reject",
                "signoffId": signoff,
                "comments": "missing budget section"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope.data.unwrap()["artifactStatus"], "rejected");
}

#[tokio::test]
async fn test_sync_ticket_without_repository() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::Development).await;
    let ticket = ticket_in(&harness.store, &project, "Export times out").await;

    let (status, envelope) = harness
        .post(
            "/api/sync",
            &principal(Role::Developer),
            json!({ "action": "syncTicket", "ticketId": ticket.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope.error.unwrap().message, "no repository connected");
}

#[tokio::test]
async fn test_sync_actions_are_role_gated() {
    let harness = Harness::new();
    let project = connected_project(&harness.store).await;

    let (status, envelope) = harness
        .post(
            "/api/sync",
            &principal(Role::Client),
            json!({ "action": "pullIssues", "projectId": project.id }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&envelope), "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_connect_then_pull() {
    let tracker = FakeTracker::new()
        .with_repository(github_repository())
        .with_issues(numbered_issues(3));
    let harness = Harness::with_tracker(tracker);
    let project = project_in(&harness.store, ProjectStatus::Development).await;
    let lead = principal(Role::TechLead);

    let (status, envelope) = harness
        .post(
            "/api/sync",
            &lead,
            json!({
                "action": "connectRepository",
                "projectId": project.id,
                "owner": "acme",
                "name": "client-portal"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{envelope:?}");
    assert_eq!(envelope.data.unwrap()["id"], REPO_ID);

    let (status, envelope) = harness
        .post(
            "/api/sync",
            &lead,
            json!({ "action": "pullIssues", "projectId": project.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let report = envelope.data.unwrap();
    assert_eq!(report["total"], 3);
    assert_eq!(report["created"], 3);
    assert_eq!(report["skipped"], json!([]));
    assert_eq!(harness.store.tickets().len(), 3);

    let (_, envelope) = harness
        .post(
            "/api/sync",
            &lead,
            json!({ "action": "disconnectRepository", "projectId": project.id }),
        )
        .await;
    assert_eq!(envelope.data.unwrap()["disconnectedRecords"], 3);
}

#[tokio::test]
async fn test_unknown_repository_is_bad_gateway() {
    let harness = Harness::new();
    let project = project_in(&harness.store, ProjectStatus::Development).await;

    let (status, envelope) = harness
        .post(
            "/api/sync",
            &principal(Role::ProjectManager),
            json!({
                "action": "connectRepository",
                "projectId": project.id,
                "owner": "acme",
                "name": "missing"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = envelope.error.unwrap();
    assert_eq!(error.code, "EXTERNAL_SERVICE_ERROR");
    assert_eq!(error.details.unwrap()["retryable"], false);
}

fn issue_event(action: &str, number: u64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": action,
        "issue": {
            "number": number,
            "title": "Login page 500s",
            "body": null,
            "state": "open",
            "labels": [{ "name": "status:blocked" }]
        },
        "repository": {
            "id": REPO_ID,
            "name": "client-portal",
            "owner": { "login": "acme" }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_signed_webhook_syncs_issue() {
    let harness = Harness::new();
    connected_project(&harness.store).await;
    let body = issue_event("opened", 12);
    let signature = SignatureValidator::new(SecretString::from(SECRET))
        .sign(&body)
        .unwrap();

    let response = warp::test::request()
        .method("POST")
        .path("/api/webhooks/github")
        .header("X-GitHub-Event", "issues")
        .header("X-GitHub-Delivery", "d0c5-1")
        .header("X-Hub-Signature-256", signature)
        .body(body)
        .reply(&harness.api())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let envelope: Envelope = serde_json::from_slice(response.body()).unwrap();
    let data = envelope.data.unwrap();
    assert_eq!(data["outcome"], "synced");
    assert_eq!(data["issueNumber"], 12);
    assert_eq!(data["action"], "created");
    assert_eq!(harness.store.tickets()[0].title, "Login page 500s");
}

#[tokio::test]
async fn test_forged_webhook_is_unauthenticated() {
    let harness = Harness::new();
    connected_project(&harness.store).await;
    let body = issue_event("opened", 12);
    let forged = SignatureValidator::new(SecretString::from("not-the-secret"))
        .sign(&body)
        .unwrap();

    let response = warp::test::request()
        .method("POST")
        .path("/api/webhooks/github")
        .header("X-GitHub-Event", "issues")
        .header("X-Hub-Signature-256", forged)
        .body(body)
        .reply(&harness.api())
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let envelope: Envelope = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(error_code(&envelope), "AUTHENTICATION_ERROR");
    assert!(harness.store.tickets().is_empty());
}

#[tokio::test]
async fn test_unknown_route() {
    let harness = Harness::new();
    let response = warp::test::request()
        .method("GET")
        .path("/api/nothing-here")
        .reply(&harness.api())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let envelope: Envelope = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(error_code(&envelope), "NOT_FOUND");
}

#[tokio::test]
async fn test_wrong_method_on_known_route() {
    let harness = Harness::new();
    let response = warp::test::request()
        .method("GET")
        .path("/api/workflow")
        .reply(&harness.api())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let envelope: Envelope = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(error_code(&envelope), "VALIDATION_ERROR");
    assert!(envelope.error.unwrap().message.contains("POST only"));
}
