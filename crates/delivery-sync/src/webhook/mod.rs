//! Tracker webhook ingestion
//!
//! Every delivery is authenticated before anything else happens: the
//! signature is checked over the raw body, and only then is the body parsed.
//! Events for repositories no project is linked to are acknowledged and
//! dropped so the tracker does not retry them.

pub mod payload;
pub mod signature;

pub use payload::{EventKind, IssuesEvent};
pub use signature::SignatureValidator;

use crate::error::WebhookError;
use crate::orchestrator::{SyncAction, SyncOrchestrator};
use delivery_model::TicketId;
use serde::{Deserialize, Serialize};

/// Raw delivery as received over HTTP
#[derive(Debug, Clone, Copy)]
pub struct WebhookDelivery<'a> {
    /// `X-GitHub-Event`
    pub event: Option<&'a str>,
    /// `X-GitHub-Delivery`
    pub delivery_id: Option<&'a str>,
    /// `X-Hub-Signature-256`
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

/// What a delivery resulted in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Issue was synced into a ticket
    #[serde(rename_all = "camelCase")]
    Synced {
        ticket_id: TicketId,
        issue_number: u64,
        action: SyncAction,
    },
    /// Issue was removed upstream; its record is disconnected
    #[serde(rename_all = "camelCase")]
    Disconnected { issue_number: u64 },
    /// Acknowledged without changes
    Ignored { reason: String },
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

/// Verifies and applies webhook deliveries
#[derive(Debug, Clone)]
pub struct WebhookHandler {
    validator: SignatureValidator,
    orchestrator: SyncOrchestrator,
}

impl WebhookHandler {
    /// Create handler
    #[must_use]
    pub fn new(validator: SignatureValidator, orchestrator: SyncOrchestrator) -> Self {
        Self {
            validator,
            orchestrator,
        }
    }

    /// Authenticate and apply one delivery
    ///
    /// # Errors
    /// - signature errors before any parsing
    /// - [`WebhookError::MissingEvent`] / [`WebhookError::InvalidPayload`]
    /// - [`WebhookError::Sync`] if applying an `issues` event fails
    pub async fn handle(
        &self,
        delivery: WebhookDelivery<'_>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = delivery.signature.ok_or(WebhookError::MissingSignature)?;
        self.validator.verify(delivery.body, signature)?;

        let event = delivery.event.ok_or(WebhookError::MissingEvent)?;
        let delivery_id = delivery.delivery_id.unwrap_or("-");

        let event = match EventKind::from_header(event) {
            EventKind::Issues => IssuesEvent::parse(delivery.body)?,
            EventKind::Ping => return Ok(WebhookOutcome::ignored("ping")),
            EventKind::PullRequest => {
                return Ok(WebhookOutcome::ignored("pull requests are not synced"))
            }
            EventKind::Other(name) => {
                tracing::debug!(delivery = delivery_id, event = %name, "ignoring webhook event");
                return Ok(WebhookOutcome::ignored(format!("unsupported event {name}")));
            }
        };

        if event.issue.is_pull_request() {
            return Ok(WebhookOutcome::ignored("pull requests are not synced"));
        }

        let Some(project) = self
            .orchestrator
            .project_for_repository(event.repository.id)
            .await?
        else {
            tracing::debug!(
                delivery = delivery_id,
                repository = event.repository.id,
                "no project linked to repository"
            );
            return Ok(WebhookOutcome::ignored("repository not connected"));
        };

        if event.is_removal() {
            self.orchestrator
                .disconnect_issue(event.repository.id, event.issue.number)
                .await?;
            return Ok(WebhookOutcome::Disconnected {
                issue_number: event.issue.number,
            });
        }

        let outcome = self
            .orchestrator
            .sync_issue(&event.issue, project.id, event.repository.id)
            .await?;
        tracing::info!(
            delivery = delivery_id,
            action = %event.action,
            issue = outcome.issue_number,
            ticket = %outcome.ticket_id,
            "webhook applied"
        );
        Ok(WebhookOutcome::Synced {
            ticket_id: outcome.ticket_id,
            issue_number: outcome.issue_number,
            action: outcome.action,
        })
    }
}
