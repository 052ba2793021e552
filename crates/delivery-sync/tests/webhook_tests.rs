use delivery_model::{InMemoryStore, SyncStatus, TicketPriority, TicketRepo, TicketStatus};
use delivery_sync::{
    SignatureValidator, SyncAction, SyncOrchestrator, WebhookDelivery, WebhookError,
    WebhookHandler, WebhookOutcome,
};
use delivery_test_utils::{connected_project, FakeTracker, REPO_ID};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;

const SECRET: &str = "whsec-test-5f1d";

fn handler(store: &Arc<InMemoryStore>) -> WebhookHandler {
    let orchestrator = SyncOrchestrator::new(store.clone(), Arc::new(FakeTracker::new()));
    WebhookHandler::new(SignatureValidator::new(SecretString::from(SECRET)), orchestrator)
}

fn sign(body: &[u8]) -> String {
    SignatureValidator::new(SecretString::from(SECRET))
        .sign(body)
        .unwrap()
}

fn issues_body(
    action: &str,
    repository_id: u64,
    number: u64,
    state: &str,
    labels: &[&str],
) -> Vec<u8> {
    let labels: Vec<_> = labels.iter().map(|name| json!({ "name": name })).collect();
    serde_json::to_vec(&json!({
        "action": action,
        "issue": {
            "number": number,
            "title": "Export times out",
            "body": "Large projects never finish",
            "state": state,
            "labels": labels,
        },
        "repository": {
            "id": repository_id,
            "name": "client-portal",
            "full_name": "acme/client-portal",
            "owner": { "login": "acme" }
        },
        "sender": { "login": "octocat" }
    }))
    .unwrap()
}

fn delivery<'a>(event: &'a str, signature: &'a str, body: &'a [u8]) -> WebhookDelivery<'a> {
    WebhookDelivery {
        event: Some(event),
        delivery_id: Some("72d3162e-cc78-11e3-81ab-4c9367dc0958"),
        signature: Some(signature),
        body,
    }
}

#[tokio::test]
async fn test_opened_issue_creates_ticket() {
    let store = Arc::new(InMemoryStore::new());
    connected_project(&store).await;
    let body = issues_body("opened", REPO_ID, 8, "open", &["priority:critical"]);
    let signature = sign(&body);

    let outcome = handler(&store)
        .handle(delivery("issues", &signature, &body))
        .await
        .unwrap();

    let (ticket_id, issue_number, action) = match outcome {
        WebhookOutcome::Synced {
            ticket_id,
            issue_number,
            action,
        } => (ticket_id, issue_number, action),
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(issue_number, 8);
    assert_eq!(action, SyncAction::Created);
    let ticket = store.ticket(ticket_id).await.unwrap().unwrap();
    assert_eq!(ticket.title, "Export times out");
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.priority, TicketPriority::Critical);
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    connected_project(&store).await;
    let handler = handler(&store);

    let opened = issues_body("opened", REPO_ID, 8, "open", &[]);
    let closed = issues_body("closed", REPO_ID, 8, "closed", &[]);
    for body in [&opened, &opened, &closed] {
        let signature = sign(body);
        handler.handle(delivery("issues", &signature, body)).await.unwrap();
    }

    let tickets = store.tickets();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].status, TicketStatus::Done);
    assert_eq!(store.sync_records().len(), 1);
}

#[tokio::test]
async fn test_bad_signature_changes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    connected_project(&store).await;
    let body = issues_body("opened", REPO_ID, 8, "open", &[]);
    let forged = SignatureValidator::new(SecretString::from("guessed"))
        .sign(&body)
        .unwrap();

    let err = handler(&store)
        .handle(delivery("issues", &forged, &body))
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::InvalidSignature));
    assert!(err.is_authentication());
    assert!(store.tickets().is_empty());
    assert!(store.sync_records().is_empty());
}

#[tokio::test]
async fn test_missing_signature_is_rejected_before_parsing() {
    let store = Arc::new(InMemoryStore::new());
    let err = handler(&store)
        .handle(WebhookDelivery {
            event: Some("issues"),
            delivery_id: None,
            signature: None,
            body: b"not even json",
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::MissingSignature));
}

#[tokio::test]
async fn test_signed_garbage_is_invalid_payload() {
    let store = Arc::new(InMemoryStore::new());
    let body = b"{\"action\":\"opened\"}";
    let signature = sign(body);
    let err = handler(&store)
        .handle(delivery("issues", &signature, body))
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_unconnected_repository_is_acknowledged() {
    let store = Arc::new(InMemoryStore::new());
    connected_project(&store).await;
    let body = issues_body("opened", 1, 8, "open", &[]);
    let signature = sign(&body);

    let outcome = handler(&store)
        .handle(delivery("issues", &signature, &body))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
    assert!(store.tickets().is_empty());
}

#[tokio::test]
async fn test_non_issue_events_are_ignored() {
    let store = Arc::new(InMemoryStore::new());
    connected_project(&store).await;
    let body = br#"{"zen":"Keep it logically awesome.","hook_id":1}"#;
    let signature = sign(body);

    for event in ["ping", "pull_request", "push"] {
        let outcome = handler(&store)
            .handle(delivery(event, &signature, body))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }), "{event}");
    }
    assert!(store.tickets().is_empty());
}

#[tokio::test]
async fn test_deleted_issue_disconnects_record() {
    let store = Arc::new(InMemoryStore::new());
    connected_project(&store).await;
    let handler = handler(&store);

    let opened = issues_body("opened", REPO_ID, 8, "open", &[]);
    let signature = sign(&opened);
    handler.handle(delivery("issues", &signature, &opened)).await.unwrap();

    let deleted = issues_body("deleted", REPO_ID, 8, "open", &[]);
    let signature = sign(&deleted);
    let outcome = handler
        .handle(delivery("issues", &signature, &deleted))
        .await
        .unwrap();

    assert_eq!(outcome, WebhookOutcome::Disconnected { issue_number: 8 });
    assert_eq!(
        store.sync_records()[0].sync_status,
        SyncStatus::Disconnected
    );
    assert_eq!(store.tickets().len(), 1);
    assert_eq!(store.tickets()[0].external_issue_number, None);
}

#[test]
fn test_outcome_wire_shape() {
    let outcome = WebhookOutcome::Ignored {
        reason: "ping".into(),
    };
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({ "outcome": "ignored", "reason": "ping" })
    );
}
