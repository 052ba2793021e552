//! Pure ticket ⇄ issue field mapping
//!
//! Status and priority travel as `status:<x>` / `priority:<x>` labels. The
//! issue body carries the ticket id in an HTML comment footer so an issue can
//! be traced back to its ticket even after the SyncRecord is gone:
//!
//! ```text
//! <description>
//!
//! ---
//! <!-- ticket-sync:6f1c…-uuid -->
//! ```

use crate::tracker::{IssueState, IssueUpdate, NewIssue};
use delivery_model::{Ticket, TicketId, TicketPriority, TicketStatus};
use once_cell::sync::Lazy;
use regex::Regex;

pub const STATUS_PREFIX: &str = "status:";
pub const PRIORITY_PREFIX: &str = "priority:";

static FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\A|\n+)---\r?\n<!-- ticket-sync:([0-9a-fA-F-]{36}) -->\s*\z")
        .expect("footer regex is valid")
});

/// Label carrying `status`; `cancelled` has none
#[must_use]
pub fn status_to_label(status: TicketStatus) -> Option<String> {
    match status {
        TicketStatus::Cancelled => None,
        other => Some(format!("{STATUS_PREFIX}{other}")),
    }
}

/// First recognised status label
#[must_use]
pub fn labels_to_status(labels: &[String]) -> Option<TicketStatus> {
    labels
        .iter()
        .filter_map(|l| l.strip_prefix(STATUS_PREFIX))
        .filter_map(|s| s.parse::<TicketStatus>().ok())
        .find(|s| *s != TicketStatus::Cancelled)
}

/// Label carrying `priority`
#[must_use]
pub fn priority_to_label(priority: TicketPriority) -> String {
    format!("{PRIORITY_PREFIX}{priority}")
}

/// First recognised priority label, `medium` otherwise
#[must_use]
pub fn labels_to_priority(labels: &[String]) -> TicketPriority {
    labels
        .iter()
        .filter_map(|l| l.strip_prefix(PRIORITY_PREFIX))
        .find_map(|p| p.parse::<TicketPriority>().ok())
        .unwrap_or_default()
}

/// Issue state a ticket status maps to
#[must_use]
pub fn issue_state(status: TicketStatus) -> IssueState {
    match status {
        TicketStatus::Done | TicketStatus::Cancelled => IssueState::Closed,
        _ => IssueState::Open,
    }
}

/// Ticket status for an inbound issue
///
/// A status label wins. Without one the issue state decides, except that a
/// closed issue leaves an already cancelled ticket cancelled.
#[must_use]
pub fn resolve_status(
    labels: &[String],
    state: IssueState,
    current: Option<TicketStatus>,
) -> TicketStatus {
    if let Some(status) = labels_to_status(labels) {
        return status;
    }
    match (state, current) {
        (IssueState::Open, _) => TicketStatus::Open,
        (IssueState::Closed, Some(TicketStatus::Cancelled)) => TicketStatus::Cancelled,
        (IssueState::Closed, _) => TicketStatus::Done,
    }
}

/// Whether a label is managed by the sync engine
#[inline]
#[must_use]
pub fn is_reserved(label: &str) -> bool {
    label.starts_with(STATUS_PREFIX) || label.starts_with(PRIORITY_PREFIX)
}

/// Labels minus the reserved ones
#[must_use]
pub fn free_labels(labels: &[String]) -> Vec<String> {
    labels.iter().filter(|l| !is_reserved(l)).cloned().collect()
}

/// Full outbound label set for a ticket
#[must_use]
pub fn outbound_labels(ticket: &Ticket) -> Vec<String> {
    let mut labels = free_labels(&ticket.labels);
    labels.extend(status_to_label(ticket.status));
    labels.push(priority_to_label(ticket.priority));
    labels
}

/// Issue body with the ticket footer appended
#[must_use]
pub fn render_body(description: &str, ticket_id: TicketId) -> String {
    let description = description.trim_end();
    let footer = format!("---\n<!-- ticket-sync:{ticket_id} -->");
    if description.is_empty() {
        footer
    } else {
        format!("{description}\n\n{footer}")
    }
}

/// Split an issue body into description and footer ticket id
///
/// Bodies without a well-formed footer are returned whole.
#[must_use]
pub fn parse_body(body: &str) -> (String, Option<TicketId>) {
    match FOOTER.captures(body) {
        Some(caps) => {
            let start = caps.get(0).map_or(body.len(), |m| m.start());
            let id = caps.get(1).and_then(|m| m.as_str().parse::<TicketId>().ok());
            (body[..start].trim_end().to_string(), id)
        }
        None => (body.trim_end().to_string(), None),
    }
}

/// Create payload for a ticket
#[must_use]
pub fn new_issue(ticket: &Ticket) -> NewIssue {
    NewIssue {
        title: ticket.title.clone(),
        body: render_body(&ticket.description, ticket.id),
        labels: outbound_labels(ticket),
    }
}

/// Update payload for a ticket
#[must_use]
pub fn issue_update(ticket: &Ticket) -> IssueUpdate {
    IssueUpdate {
        title: ticket.title.clone(),
        body: render_body(&ticket.description, ticket.id),
        state: issue_state(ticket.status),
        labels: outbound_labels(ticket),
    }
}
