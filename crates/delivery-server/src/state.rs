//! Engines shared by every request

use delivery_model::Store;
use delivery_sync::{IssueTracker, SignatureValidator, SyncOrchestrator, WebhookHandler};
use delivery_workflow::{ApprovalEngine, LifecycleEngine};
use secrecy::SecretString;
use std::sync::Arc;

/// Application state cloned into each route
#[derive(Debug, Clone)]
pub struct AppState {
    pub lifecycle: LifecycleEngine,
    pub approvals: ApprovalEngine,
    pub sync: SyncOrchestrator,
    pub webhooks: WebhookHandler,
}

impl AppState {
    /// Wire the engines over one store and one tracker
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        tracker: Arc<dyn IssueTracker>,
        webhook_secret: SecretString,
    ) -> Self {
        let sync = SyncOrchestrator::new(store.clone(), tracker);
        Self {
            lifecycle: LifecycleEngine::new(store.clone()),
            approvals: ApprovalEngine::new(store),
            webhooks: WebhookHandler::new(SignatureValidator::new(webhook_secret), sync.clone()),
            sync,
        }
    }
}
