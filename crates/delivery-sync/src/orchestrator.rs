//! Ticket ⇄ issue synchronization
//!
//! Idempotency rests on the SyncRecord unique keys enforced by the store, not
//! on locks: whichever writer loses an insert race re-reads the winner's record
//! and falls through to the update path.
//!
//! - Outbound: ticket → issue, keyed by the active `(ticket, issue)` record
//! - Inbound: issue → ticket, keyed by `(repository, issue, number)`; the
//!   record is inserted *before* the ticket so concurrent deliveries of the
//!   same issue cannot both create one

use crate::error::SyncError;
use crate::mapper;
use crate::tracker::{Issue, IssueState, IssueTracker};
use chrono::Utc;
use delivery_model::{
    AuditEntry, EntityType, Project, ProjectId, RepositoryLink, Store, SyncDirection, SyncRecord,
    SyncStatus, Ticket, TicketId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// `last_error` of records whose issue was deleted or transferred away
const ISSUE_REMOVED: &str = "issue removed from tracker";

/// What a single sync did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
}

/// Result of syncing one ticket/issue pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub ticket_id: TicketId,
    pub issue_number: u64,
    pub action: SyncAction,
}

/// Issue left out of a bulk pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedIssue {
    pub issue_number: u64,
    pub reason: String,
}

/// Counts from [`SyncOrchestrator::pull_issues`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncReport {
    /// Issues considered, pull requests excluded
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub ignored_pull_requests: usize,
    pub skipped: Vec<SkippedIssue>,
}

impl BulkSyncReport {
    /// Issues that ended up synced
    #[inline]
    #[must_use]
    pub fn synced(&self) -> usize {
        self.created + self.updated
    }
}

/// Coordinates the store and the tracker
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn Store>,
    tracker: Arc<dyn IssueTracker>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator").finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    /// Create orchestrator
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tracker: Arc<dyn IssueTracker>) -> Self {
        Self { store, tracker }
    }

    /// Push a ticket to its project's repository
    ///
    /// # Errors
    /// - [`SyncError::NotFound`] for a missing ticket or project
    /// - [`SyncError::Validation`] if the project has no repository
    /// - [`SyncError::External`] if the tracker call fails; an existing
    ///   record is marked `error` first
    pub async fn sync_ticket(&self, ticket_id: TicketId) -> Result<SyncOutcome, SyncError> {
        let ticket = self
            .store
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| SyncError::not_found("ticket", ticket_id))?;
        let project = self.load_project(ticket.project_id).await?;
        let repo = connected_repository(&project)?;

        let active = self
            .store
            .sync_record_by_ticket(ticket.id, EntityType::Issue)
            .await?;
        let record = match active {
            Some(record) if record.repository_id == repo.id => Some(record),
            Some(mut stale) => {
                tracing::debug!(
                    ticket = %ticket.id,
                    repository = stale.repository_id,
                    "retiring record for previous repository"
                );
                stale.sync_status = SyncStatus::Disconnected;
                self.store.update_sync_record(&stale).await?;
                None
            }
            None => self.reclaimable_record(&ticket, repo.id).await?,
        };

        match record {
            Some(record) => self.push_update(repo, ticket, record).await,
            None => self.push_create(&project, repo, ticket).await,
        }
    }

    /// Bring one tracker issue into the project's tickets
    ///
    /// # Errors
    /// - [`SyncError::Validation`] for pull requests
    /// - [`SyncError::Store`] if persistence fails; a claimed record is
    ///   marked `error`
    pub async fn sync_issue(
        &self,
        issue: &Issue,
        project_id: ProjectId,
        repository_id: u64,
    ) -> Result<SyncOutcome, SyncError> {
        if issue.is_pull_request() {
            return Err(SyncError::Validation(format!(
                "#{} is a pull request",
                issue.number
            )));
        }

        let existing = self
            .store
            .sync_record_by_external(repository_id, EntityType::Issue, issue.number)
            .await?;
        let record = match existing {
            Some(record) if record.project_id != project_id => {
                self.rebind(record, project_id).await?
            }
            Some(record) => record,
            None => {
                let claim = SyncRecord::issue(
                    project_id,
                    repository_id,
                    issue.number,
                    None,
                    SyncDirection::Inbound,
                );
                match self.store.insert_sync_record(claim.clone()).await {
                    Ok(()) => claim,
                    Err(e) if e.is_unique_violation() => {
                        tracing::debug!(
                            issue = issue.number,
                            "issue claimed concurrently; updating"
                        );
                        self.store
                            .sync_record_by_external(repository_id, EntityType::Issue, issue.number)
                            .await?
                            .ok_or(SyncError::Store(e))?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let mut failed = record.clone();
        match self.apply_inbound(issue, project_id, record).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                failed.sync_status = SyncStatus::Error;
                failed.last_error = Some(e.to_string());
                if let Err(store_err) = self.store.update_sync_record(&failed).await {
                    tracing::warn!(
                        issue = issue.number,
                        error = %store_err,
                        "failed to mark sync record as errored"
                    );
                }
                Err(e)
            }
        }
    }

    /// Pull every issue of the project's repository
    ///
    /// Failures on individual issues are reported in
    /// [`BulkSyncReport::skipped`] and do not fail the call.
    ///
    /// # Errors
    /// - [`SyncError::Validation`] if the project has no repository
    /// - [`SyncError::External`] if listing issues fails
    pub async fn pull_issues(&self, project_id: ProjectId) -> Result<BulkSyncReport, SyncError> {
        let project = self.load_project(project_id).await?;
        let repo = connected_repository(&project)?;
        let issues = self.tracker.list_issues(repo).await?;

        let mut report = BulkSyncReport::default();
        for issue in &issues {
            if issue.is_pull_request() {
                report.ignored_pull_requests += 1;
                continue;
            }
            report.total += 1;
            match self.sync_issue(issue, project.id, repo.id).await {
                Ok(outcome) => match outcome.action {
                    SyncAction::Created => report.created += 1,
                    SyncAction::Updated => report.updated += 1,
                },
                Err(e) => {
                    tracing::warn!(
                        project = %project.id,
                        issue = issue.number,
                        error = %e,
                        "skipping issue"
                    );
                    report.skipped.push(SkippedIssue {
                        issue_number: issue.number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            project = %project.id,
            total = report.total,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped.len(),
            "bulk issue pull finished"
        );
        Ok(report)
    }

    /// Mark the record for a deleted issue as disconnected
    ///
    /// The linked ticket forgets the issue number, so its next outbound sync
    /// opens a new issue instead of reviving the removed one. Returns whether a
    /// record existed.
    ///
    /// # Errors
    /// [`SyncError::Store`] on persistence failure
    pub async fn disconnect_issue(
        &self,
        repository_id: u64,
        number: u64,
    ) -> Result<bool, SyncError> {
        let Some(mut record) = self
            .store
            .sync_record_by_external(repository_id, EntityType::Issue, number)
            .await?
        else {
            return Ok(false);
        };
        record.sync_status = SyncStatus::Disconnected;
        record.last_error = Some(ISSUE_REMOVED.into());
        record.last_synced_at = Utc::now();
        self.store.update_sync_record(&record).await?;

        if let Some(ticket_id) = record.ticket_id {
            if let Some(mut ticket) = self.store.ticket(ticket_id).await? {
                if ticket.external_issue_number == Some(number) {
                    ticket.external_issue_number = None;
                    ticket.updated_at = Utc::now();
                    self.store.update_ticket(&ticket).await?;
                }
            }
        }

        tracing::info!(
            repository = repository_id,
            issue = number,
            "issue removed; record disconnected"
        );
        Ok(true)
    }

    /// Link a project to a tracker repository
    ///
    /// Records of a previously linked repository are disconnected.
    ///
    /// # Errors
    /// - [`SyncError::Validation`] on an empty owner or name
    /// - [`SyncError::Conflict`] if another project already uses the repository
    /// - [`SyncError::External`] if the repository cannot be resolved
    pub async fn connect_repository(
        &self,
        project_id: ProjectId,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryLink, SyncError> {
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() {
            return Err(SyncError::Validation(
                "repository owner and name are required".into(),
            ));
        }
        let mut project = self.load_project(project_id).await?;
        let link = self.tracker.repository(owner, name).await?.to_link();

        if let Some(other) = self.store.project_by_repository(link.id).await? {
            if other.id != project.id {
                return Err(SyncError::Conflict(format!(
                    "{} is already connected to another project",
                    link.full_name()
                )));
            }
        }

        let previous = project.repository.replace(link.clone());
        if let Some(old) = previous.as_ref().filter(|old| old.id != link.id) {
            self.disconnect_records(project.id, Some(old.id)).await?;
        }
        project.updated_at = Utc::now();
        self.store.update_project(&project).await?;

        tracing::info!(
            project = %project.id,
            repository = %link.full_name(),
            "repository connected"
        );
        let entry = AuditEntry::system("project.repository_connected", "project", project.id)
            .change(
                json!({ "repository": previous }),
                json!({ "repository": link }),
            );
        self.audit(entry).await;
        Ok(link)
    }

    /// Remove a project's repository link
    ///
    /// Returns how many sync records were disconnected.
    ///
    /// # Errors
    /// [`SyncError::Validation`] if no repository is connected
    pub async fn disconnect_repository(&self, project_id: ProjectId) -> Result<usize, SyncError> {
        let mut project = self.load_project(project_id).await?;
        let Some(previous) = project.repository.take() else {
            return Err(SyncError::Validation("no repository connected".into()));
        };
        project.updated_at = Utc::now();
        self.store.update_project(&project).await?;
        let disconnected = self.disconnect_records(project.id, None).await?;

        tracing::info!(
            project = %project.id,
            repository = %previous.full_name(),
            disconnected,
            "repository disconnected"
        );
        let entry = AuditEntry::system("project.repository_disconnected", "project", project.id)
            .change(
                json!({ "repository": previous }),
                json!({ "repository": null, "disconnected_records": disconnected }),
            );
        self.audit(entry).await;
        Ok(disconnected)
    }

    /// Project linked to a repository, if any
    ///
    /// # Errors
    /// [`SyncError::Store`] on persistence failure
    pub async fn project_for_repository(
        &self,
        repository_id: u64,
    ) -> Result<Option<Project>, SyncError> {
        Ok(self.store.project_by_repository(repository_id).await?)
    }

    async fn load_project(&self, id: ProjectId) -> Result<Project, SyncError> {
        self.store
            .project(id)
            .await?
            .ok_or_else(|| SyncError::not_found("project", id))
    }

    /// Disconnected record for the ticket's last known issue in this repository
    ///
    /// Records of issues removed from the tracker are never reclaimed.
    async fn reclaimable_record(
        &self,
        ticket: &Ticket,
        repository_id: u64,
    ) -> Result<Option<SyncRecord>, SyncError> {
        let Some(number) = ticket.external_issue_number else {
            return Ok(None);
        };
        let record = self
            .store
            .sync_record_by_external(repository_id, EntityType::Issue, number)
            .await?;
        Ok(record.filter(|r| {
            r.ticket_id == Some(ticket.id) && r.last_error.as_deref() != Some(ISSUE_REMOVED)
        }))
    }

    /// Hand a record left behind by another project to `project_id`
    ///
    /// The previous ticket link is dropped so the issue is relinked by footer
    /// or gets a fresh ticket in the new project.
    async fn rebind(
        &self,
        mut record: SyncRecord,
        project_id: ProjectId,
    ) -> Result<SyncRecord, SyncError> {
        tracing::info!(
            issue = record.external_id,
            from = %record.project_id,
            to = %project_id,
            "rebinding issue record to project"
        );
        record.project_id = project_id;
        record.ticket_id = None;
        record.direction = SyncDirection::Inbound;
        record.last_error = None;
        self.store.update_sync_record(&record).await?;
        Ok(record)
    }

    async fn push_update(
        &self,
        repo: &RepositoryLink,
        mut ticket: Ticket,
        mut record: SyncRecord,
    ) -> Result<SyncOutcome, SyncError> {
        let update = mapper::issue_update(&ticket);
        match self.tracker.update_issue(repo, record.external_id, &update).await {
            Ok(issue) => {
                record.mark_synced(SyncDirection::Outbound);
                self.store.update_sync_record(&record).await?;
                self.link_ticket(&mut ticket, issue.number).await?;
                tracing::info!(
                    ticket = %ticket.id,
                    issue = issue.number,
                    "issue updated from ticket"
                );
                Ok(SyncOutcome {
                    ticket_id: ticket.id,
                    issue_number: issue.number,
                    action: SyncAction::Updated,
                })
            }
            Err(e) => {
                record.sync_status = SyncStatus::Error;
                record.last_error = Some(e.to_string());
                if let Err(store_err) = self.store.update_sync_record(&record).await {
                    tracing::warn!(
                        ticket = %ticket.id,
                        error = %store_err,
                        "failed to mark sync record as errored"
                    );
                }
                tracing::warn!(
                    ticket = %ticket.id,
                    issue = record.external_id,
                    error = %e,
                    "issue update failed"
                );
                Err(e.into())
            }
        }
    }

    async fn push_create(
        &self,
        project: &Project,
        repo: &RepositoryLink,
        mut ticket: Ticket,
    ) -> Result<SyncOutcome, SyncError> {
        let issue = self
            .tracker
            .create_issue(repo, &mapper::new_issue(&ticket))
            .await?;
        let record = SyncRecord::issue(
            project.id,
            repo.id,
            issue.number,
            Some(ticket.id),
            SyncDirection::Outbound,
        );

        if let Err(e) = self.store.insert_sync_record(record.clone()).await {
            if !e.is_unique_violation() {
                // The footer still names the ticket, so the issue can be
                // relinked by an inbound sync.
                tracing::warn!(
                    ticket = %ticket.id,
                    issue = issue.number,
                    error = %e,
                    "issue created but its sync record was not stored; issue is orphaned"
                );
                return Err(e.into());
            }
            let winner = self
                .store
                .sync_record_by_ticket(ticket.id, EntityType::Issue)
                .await?
                .ok_or(SyncError::Store(e))?;
            tracing::debug!(
                ticket = %ticket.id,
                issue = winner.external_id,
                "ticket synced concurrently; updating"
            );
            return self.push_update(repo, ticket, winner).await;
        }

        // Issues are always created open.
        if mapper::issue_state(ticket.status) == IssueState::Closed {
            let mut outcome = self.push_update(repo, ticket, record).await?;
            outcome.action = SyncAction::Created;
            return Ok(outcome);
        }

        self.link_ticket(&mut ticket, issue.number).await?;
        tracing::info!(
            ticket = %ticket.id,
            issue = issue.number,
            "issue created from ticket"
        );
        Ok(SyncOutcome {
            ticket_id: ticket.id,
            issue_number: issue.number,
            action: SyncAction::Created,
        })
    }

    async fn link_ticket(&self, ticket: &mut Ticket, number: u64) -> Result<(), SyncError> {
        let now = Utc::now();
        ticket.external_issue_number = Some(number);
        ticket.last_synced_at = Some(now);
        self.store.update_ticket(ticket).await?;
        Ok(())
    }

    async fn apply_inbound(
        &self,
        issue: &Issue,
        project_id: ProjectId,
        mut record: SyncRecord,
    ) -> Result<SyncOutcome, SyncError> {
        let (description, footer_id) =
            mapper::parse_body(issue.body.as_deref().unwrap_or_default());

        let linked = match record.ticket_id {
            Some(id) => self
                .store
                .ticket(id)
                .await?
                .filter(|ticket| ticket.project_id == project_id),
            None => None,
        };
        let (ticket, action) = match linked {
            Some(mut ticket) => {
                apply_issue_fields(&mut ticket, issue, description);
                self.store.update_ticket(&ticket).await?;
                (ticket, SyncAction::Updated)
            }
            None => match self.relink_target(footer_id, project_id).await? {
                Some(mut ticket) => {
                    apply_issue_fields(&mut ticket, issue, description);
                    self.store.update_ticket(&ticket).await?;
                    tracing::debug!(
                        ticket = %ticket.id,
                        issue = issue.number,
                        "issue relinked to ticket via footer"
                    );
                    (ticket, SyncAction::Updated)
                }
                None => {
                    let mut ticket = Ticket::new(project_id, issue.title.clone());
                    apply_issue_fields(&mut ticket, issue, description);
                    self.store.insert_ticket(ticket.clone()).await?;
                    let entry =
                        AuditEntry::system("ticket.created_from_issue", "ticket", ticket.id)
                            .change(
                                json!(null),
                                json!({ "issue_number": issue.number, "title": ticket.title }),
                            );
                    self.audit(entry).await;
                    (ticket, SyncAction::Created)
                }
            },
        };

        record.ticket_id = Some(ticket.id);
        record.mark_synced(SyncDirection::Inbound);
        self.store.update_sync_record(&record).await?;

        tracing::info!(
            ticket = %ticket.id,
            issue = issue.number,
            action = ?action,
            "ticket synced from issue"
        );
        Ok(SyncOutcome {
            ticket_id: ticket.id,
            issue_number: issue.number,
            action,
        })
    }

    /// Ticket named by the body footer, if it belongs to the project and is
    /// not actively linked elsewhere
    async fn relink_target(
        &self,
        footer_id: Option<TicketId>,
        project_id: ProjectId,
    ) -> Result<Option<Ticket>, SyncError> {
        let Some(id) = footer_id else {
            return Ok(None);
        };
        let Some(ticket) = self.store.ticket(id).await? else {
            return Ok(None);
        };
        if ticket.project_id != project_id {
            return Ok(None);
        }
        if self
            .store
            .sync_record_by_ticket(id, EntityType::Issue)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        Ok(Some(ticket))
    }

    /// Disconnect a project's active records, optionally only one repository's
    async fn disconnect_records(
        &self,
        project_id: ProjectId,
        repository_id: Option<u64>,
    ) -> Result<usize, SyncError> {
        let records = self.store.sync_records_for_project(project_id).await?;
        let mut count = 0;
        for mut record in records {
            if !record.is_active() || repository_id.is_some_and(|id| id != record.repository_id) {
                continue;
            }
            record.sync_status = SyncStatus::Disconnected;
            self.store.update_sync_record(&record).await?;
            count += 1;
        }
        Ok(count)
    }

    async fn audit(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.store.append_audit(entry).await {
            tracing::warn!(%action, error = %e, "failed to write audit entry");
        }
    }
}

fn connected_repository(project: &Project) -> Result<&RepositoryLink, SyncError> {
    project
        .repository
        .as_ref()
        .ok_or_else(|| SyncError::Validation("no repository connected".into()))
}

fn apply_issue_fields(ticket: &mut Ticket, issue: &Issue, description: String) {
    let labels = issue.label_names();
    let now = Utc::now();
    ticket.title.clone_from(&issue.title);
    ticket.description = description;
    ticket.status = mapper::resolve_status(&labels, issue.state, Some(ticket.status));
    ticket.priority = mapper::labels_to_priority(&labels);
    ticket.labels = mapper::free_labels(&labels);
    ticket.external_issue_number = Some(issue.number);
    ticket.last_synced_at = Some(now);
    ticket.updated_at = now;
}
