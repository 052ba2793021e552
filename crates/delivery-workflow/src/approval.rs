//! Artifact sign-off engine
//!
//! A sign-off request opens a *review round* on an artifact and fans out one
//! pending [`Signoff`] per approver. The artifact's status is never tracked
//! incrementally: after every decision the round's signoffs are re-read and
//! folded through [`reduce_round`], so out-of-order approvals cannot drift
//! from the ground truth.

use crate::authority::{authorize, Action};
use crate::error::WorkflowError;
use chrono::{NaiveDate, Utc};
use delivery_model::{
    ApprovalEvidence, Artifact, ArtifactId, ArtifactStatus, AuditEntry, ContentHash, Notification,
    Principal, RequestMeta, Signoff, SignoffId, SignoffStatus, Store, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Fold a round's signoff statuses into the artifact status
///
/// Any rejection vetoes the round; otherwise the artifact is approved once
/// every signoff is approved, and pending review until then.
#[must_use]
pub fn reduce_round<I>(statuses: I) -> ArtifactStatus
where
    I: IntoIterator<Item = SignoffStatus>,
{
    let mut any = false;
    let mut all_approved = true;
    for status in statuses {
        any = true;
        match status {
            SignoffStatus::Rejected => return ArtifactStatus::Rejected,
            SignoffStatus::Approved => {}
            SignoffStatus::Pending | SignoffStatus::Delegated => all_approved = false,
        }
    }
    if any && all_approved {
        ArtifactStatus::Approved
    } else {
        ArtifactStatus::PendingReview
    }
}

/// Input for [`ApprovalEngine::create_signoff_request`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignoffRequest {
    pub artifact_id: ArtifactId,
    pub approver_ids: Vec<UserId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Signoffs created by one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignoffRound {
    pub artifact_id: ArtifactId,
    pub review_round: u32,
    pub signoff_ids: Vec<SignoffId>,
}

/// State after a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub signoff_id: SignoffId,
    pub signoff_status: SignoffStatus,
    pub artifact_id: ArtifactId,
    pub artifact_status: ArtifactStatus,
}

/// Sign-off request and decision handling
#[derive(Clone)]
pub struct ApprovalEngine {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for ApprovalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalEngine").finish_non_exhaustive()
    }
}

fn required_comments(comments: Option<String>, action: &str) -> Result<String, WorkflowError> {
    match comments.map(|c| c.trim().to_string()) {
        Some(c) if !c.is_empty() => Ok(c),
        _ => Err(WorkflowError::Validation(format!(
            "comments are required to {action}"
        ))),
    }
}

fn optional_comments(comments: Option<String>) -> Option<String> {
    comments
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

impl ApprovalEngine {
    /// Create engine over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Open a new review round and fan out one signoff per approver
    ///
    /// # Errors
    /// - [`WorkflowError::Unauthorized`] unless the role is author-tier
    /// - [`WorkflowError::Validation`] on an empty or duplicated approver list
    /// - [`WorkflowError::NotFound`] if the artifact does not exist
    /// - [`WorkflowError::Conflict`] if the artifact is approved or superseded
    pub async fn create_signoff_request(
        &self,
        principal: &Principal,
        request: SignoffRequest,
    ) -> Result<SignoffRound, WorkflowError> {
        authorize(principal.role, Action::RequestSignoff)?;

        if request.approver_ids.is_empty() {
            return Err(WorkflowError::Validation(
                "at least one approver is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = request.approver_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(WorkflowError::Validation(format!(
                "approver {dup} listed more than once"
            )));
        }

        let mut artifact = self.load_artifact(request.artifact_id).await?;
        match artifact.status {
            ArtifactStatus::Approved => {
                return Err(WorkflowError::Conflict("artifact is already approved".into()))
            }
            ArtifactStatus::Superseded => {
                return Err(WorkflowError::Conflict(
                    "artifact has been superseded by a newer version".into(),
                ))
            }
            ArtifactStatus::Draft | ArtifactStatus::PendingReview | ArtifactStatus::Rejected => {}
        }

        // The round is bumped before any signoff exists so a retried request
        // can never mix its signoffs into an earlier round.
        let previous = artifact.status;
        artifact.review_round += 1;
        artifact.status = ArtifactStatus::PendingReview;
        artifact.updated_at = Utc::now();
        self.store.update_artifact(&artifact).await?;

        let mut signoff_ids = Vec::with_capacity(request.approver_ids.len());
        for approver in &request.approver_ids {
            let signoff = Signoff::pending(
                artifact.id,
                artifact.review_round,
                *approver,
                principal.user_id,
                request.due_date,
            );
            signoff_ids.push(signoff.id);
            self.store.insert_signoff(signoff).await?;

            let notification = Notification::new(
                *approver,
                "signoff_requested",
                format!("Sign-off requested: {}", artifact.title),
            )
            .with_link(format!("/artifacts/{}", artifact.id));
            crate::notify(self.store.as_ref(), notification).await;
        }

        tracing::info!(
            artifact = %artifact.id,
            round = artifact.review_round,
            approvers = signoff_ids.len(),
            "sign-off requested"
        );

        let entry = AuditEntry::system("artifact.signoff_requested", "artifact", artifact.id)
            .by(principal.user_id, principal.role)
            .change(
                json!({ "status": previous }),
                json!({
                    "status": artifact.status,
                    "review_round": artifact.review_round,
                    "approvers": request.approver_ids,
                    "due_date": request.due_date,
                }),
            );
        crate::record_audit(self.store.as_ref(), entry).await;

        Ok(SignoffRound {
            artifact_id: artifact.id,
            review_round: artifact.review_round,
            signoff_ids,
        })
    }

    /// Approve a signoff, then re-derive the artifact status
    ///
    /// # Errors
    /// - [`WorkflowError::NotFound`] if the signoff or artifact is missing
    /// - [`WorkflowError::Unauthorized`] unless the caller is assignee or delegate
    /// - [`WorkflowError::Conflict`] if already decided or not under review
    pub async fn approve(
        &self,
        principal: &Principal,
        signoff_id: SignoffId,
        comments: Option<String>,
        meta: &RequestMeta,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let (mut signoff, artifact) = self.load_decidable(principal, signoff_id).await?;

        let content_hash = ContentHash::of_json(&artifact.content)?;
        signoff.status = SignoffStatus::Approved;
        signoff.comments = optional_comments(comments).or(signoff.comments);
        signoff.decision_at = Some(Utc::now());
        signoff.evidence = Some(ApprovalEvidence {
            content_hash,
            artifact_version: artifact.version,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        });
        self.store.update_signoff(&signoff).await?;

        tracing::info!(
            signoff = %signoff.id,
            artifact = %artifact.id,
            hash = %content_hash.short(),
            "signoff approved"
        );

        let artifact_status = self.settle_artifact(artifact.id).await?;
        if artifact_status == ArtifactStatus::Approved {
            let notification = Notification::new(
                signoff.requested_by,
                "artifact_approved",
                format!("{} has been fully approved", artifact.title),
            )
            .with_link(format!("/artifacts/{}", artifact.id));
            crate::notify(self.store.as_ref(), notification).await;
        }

        let entry = AuditEntry::system("signoff.approved", "signoff", signoff.id)
            .by(principal.user_id, principal.role)
            .change(
                json!({ "status": SignoffStatus::Pending }),
                json!({
                    "status": signoff.status,
                    "content_hash": content_hash,
                    "artifact_status": artifact_status,
                }),
            )
            .from_request(meta);
        crate::record_audit(self.store.as_ref(), entry).await;

        Ok(DecisionOutcome {
            signoff_id: signoff.id,
            signoff_status: signoff.status,
            artifact_id: artifact.id,
            artifact_status,
        })
    }

    /// Reject a signoff; one rejection vetoes the artifact
    ///
    /// Other signoffs of the round are left as they are so the approval
    /// trail stays intact.
    ///
    /// # Errors
    /// - [`WorkflowError::Validation`] if comments are missing
    /// - otherwise as [`ApprovalEngine::approve`]
    pub async fn reject(
        &self,
        principal: &Principal,
        signoff_id: SignoffId,
        comments: Option<String>,
        meta: &RequestMeta,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let comments = required_comments(comments, "reject")?;
        let (mut signoff, artifact) = self.load_decidable(principal, signoff_id).await?;

        signoff.status = SignoffStatus::Rejected;
        signoff.comments = Some(comments.clone());
        signoff.decision_at = Some(Utc::now());
        self.store.update_signoff(&signoff).await?;

        tracing::info!(signoff = %signoff.id, artifact = %artifact.id, "signoff rejected");

        let artifact_status = self.settle_artifact(artifact.id).await?;

        let notification = Notification::new(
            signoff.requested_by,
            "signoff_rejected",
            format!("{} was rejected: {comments}", artifact.title),
        )
        .with_link(format!("/artifacts/{}", artifact.id));
        crate::notify(self.store.as_ref(), notification).await;

        let entry = AuditEntry::system("signoff.rejected", "signoff", signoff.id)
            .by(principal.user_id, principal.role)
            .change(
                json!({ "status": SignoffStatus::Pending }),
                json!({ "status": signoff.status, "comments": comments }),
            )
            .from_request(meta);
        crate::record_audit(self.store.as_ref(), entry).await;

        Ok(DecisionOutcome {
            signoff_id: signoff.id,
            signoff_status: signoff.status,
            artifact_id: artifact.id,
            artifact_status,
        })
    }

    /// Send the artifact back to draft for revision
    ///
    /// The signoff keeps its status; the next sign-off request opens a fresh
    /// round.
    ///
    /// # Errors
    /// - [`WorkflowError::Validation`] if comments are missing
    /// - otherwise as [`ApprovalEngine::approve`]
    pub async fn request_changes(
        &self,
        principal: &Principal,
        signoff_id: SignoffId,
        comments: Option<String>,
        meta: &RequestMeta,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let comments = required_comments(comments, "request changes")?;
        let (mut signoff, mut artifact) = self.load_decidable(principal, signoff_id).await?;

        signoff.comments = Some(comments.clone());
        self.store.update_signoff(&signoff).await?;

        let previous = artifact.status;
        artifact.status = ArtifactStatus::Draft;
        artifact.updated_at = Utc::now();
        self.store.update_artifact(&artifact).await?;

        tracing::info!(signoff = %signoff.id, artifact = %artifact.id, "changes requested");

        let notification = Notification::new(
            signoff.requested_by,
            "changes_requested",
            format!("Changes requested on {}: {comments}", artifact.title),
        )
        .with_link(format!("/artifacts/{}", artifact.id));
        crate::notify(self.store.as_ref(), notification).await;

        let entry = AuditEntry::system("artifact.changes_requested", "artifact", artifact.id)
            .by(principal.user_id, principal.role)
            .change(
                json!({ "status": previous }),
                json!({ "status": artifact.status, "signoff": signoff.id, "comments": comments }),
            )
            .from_request(meta);
        crate::record_audit(self.store.as_ref(), entry).await;

        Ok(DecisionOutcome {
            signoff_id: signoff.id,
            signoff_status: signoff.status,
            artifact_id: artifact.id,
            artifact_status: artifact.status,
        })
    }

    /// Hand a pending signoff to another user
    ///
    /// Only the original assignee may delegate, and only once.
    ///
    /// # Errors
    /// - [`WorkflowError::Unauthorized`] unless the caller is the assignee
    /// - [`WorkflowError::Conflict`] if the signoff is not pending
    /// - [`WorkflowError::Validation`] if delegating to the assignee
    pub async fn delegate(
        &self,
        principal: &Principal,
        signoff_id: SignoffId,
        delegate_to: UserId,
        comments: Option<String>,
        meta: &RequestMeta,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let mut signoff = self.load_signoff(signoff_id).await?;
        let artifact = self.load_artifact(signoff.artifact_id).await?;

        if signoff.assignee != principal.user_id {
            return Err(WorkflowError::Unauthorized(
                "only the assignee may delegate a signoff".into(),
            ));
        }
        match signoff.status {
            SignoffStatus::Pending => {}
            SignoffStatus::Delegated => {
                return Err(WorkflowError::Conflict(
                    "signoff has already been delegated".into(),
                ))
            }
            decided => {
                return Err(WorkflowError::Conflict(format!(
                    "signoff is already {decided}"
                )))
            }
        }
        ensure_under_review(&signoff, &artifact)?;
        if delegate_to == signoff.assignee {
            return Err(WorkflowError::Validation(
                "cannot delegate a signoff to its assignee".into(),
            ));
        }

        signoff.status = SignoffStatus::Delegated;
        signoff.delegated_to = Some(delegate_to);
        if let Some(comments) = optional_comments(comments) {
            signoff.comments = Some(comments);
        }
        self.store.update_signoff(&signoff).await?;

        tracing::info!(signoff = %signoff.id, delegate = %delegate_to, "signoff delegated");

        let notification = Notification::new(
            delegate_to,
            "signoff_delegated",
            format!("Sign-off delegated to you: {}", artifact.title),
        )
        .with_link(format!("/artifacts/{}", artifact.id));
        crate::notify(self.store.as_ref(), notification).await;

        let entry = AuditEntry::system("signoff.delegated", "signoff", signoff.id)
            .by(principal.user_id, principal.role)
            .change(
                json!({ "status": SignoffStatus::Pending }),
                json!({ "status": signoff.status, "delegated_to": delegate_to }),
            )
            .from_request(meta);
        crate::record_audit(self.store.as_ref(), entry).await;

        Ok(DecisionOutcome {
            signoff_id: signoff.id,
            signoff_status: signoff.status,
            artifact_id: artifact.id,
            artifact_status: artifact.status,
        })
    }

    async fn load_signoff(&self, id: SignoffId) -> Result<Signoff, WorkflowError> {
        self.store
            .signoff(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("signoff", id))
    }

    async fn load_artifact(&self, id: ArtifactId) -> Result<Artifact, WorkflowError> {
        self.store
            .artifact(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("artifact", id))
    }

    /// Load a signoff the caller may decide right now
    async fn load_decidable(
        &self,
        principal: &Principal,
        signoff_id: SignoffId,
    ) -> Result<(Signoff, Artifact), WorkflowError> {
        let signoff = self.load_signoff(signoff_id).await?;
        let artifact = self.load_artifact(signoff.artifact_id).await?;

        if !signoff.is_decider(principal.user_id) {
            return Err(WorkflowError::Unauthorized(
                "only the assignee or delegate may decide this signoff".into(),
            ));
        }
        if !signoff.status.is_open() {
            return Err(WorkflowError::Conflict(format!(
                "signoff is already {}",
                signoff.status
            )));
        }
        ensure_under_review(&signoff, &artifact)?;
        Ok((signoff, artifact))
    }

    /// Re-read the current round and write the reduced artifact status
    async fn settle_artifact(
        &self,
        artifact_id: ArtifactId,
    ) -> Result<ArtifactStatus, WorkflowError> {
        let mut artifact = self.load_artifact(artifact_id).await?;
        if !matches!(
            artifact.status,
            ArtifactStatus::PendingReview | ArtifactStatus::Rejected
        ) {
            // Sent back to draft or superseded while this decision was in flight.
            return Ok(artifact.status);
        }

        let round = artifact.review_round;
        let signoffs = self.store.signoffs_for_artifact(artifact_id).await?;
        let status = reduce_round(
            signoffs
                .iter()
                .filter(|s| s.review_round == round)
                .map(|s| s.status),
        );

        if status != artifact.status {
            tracing::info!(
                artifact = %artifact_id,
                from = %artifact.status,
                to = %status,
                "artifact status settled"
            );
            artifact.status = status;
            artifact.updated_at = Utc::now();
            self.store.update_artifact(&artifact).await?;
        }
        Ok(status)
    }
}

fn ensure_under_review(signoff: &Signoff, artifact: &Artifact) -> Result<(), WorkflowError> {
    if signoff.review_round != artifact.review_round {
        return Err(WorkflowError::Conflict(
            "signoff belongs to an earlier review round".into(),
        ));
    }
    match artifact.status {
        ArtifactStatus::PendingReview | ArtifactStatus::Rejected => Ok(()),
        other => Err(WorkflowError::Conflict(format!(
            "artifact is {other}, not under review"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use SignoffStatus::{Approved, Delegated, Pending, Rejected};

    #[test]
    fn reduce_empty_round_is_pending() {
        assert_eq!(reduce_round(Vec::new()), ArtifactStatus::PendingReview);
    }

    #[test]
    fn reduce_partial_approval_is_pending() {
        assert_eq!(
            reduce_round([Approved, Pending]),
            ArtifactStatus::PendingReview
        );
        assert_eq!(
            reduce_round([Approved, Delegated]),
            ArtifactStatus::PendingReview
        );
    }

    #[test]
    fn reduce_full_approval() {
        assert_eq!(reduce_round([Approved, Approved]), ArtifactStatus::Approved);
    }

    #[test]
    fn reduce_any_rejection_vetoes() {
        assert_eq!(reduce_round([Rejected, Pending]), ArtifactStatus::Rejected);
        assert_eq!(reduce_round([Approved, Rejected]), ArtifactStatus::Rejected);
    }

    #[test]
    fn required_comments_trims() {
        assert!(required_comments(None, "reject").is_err());
        assert!(required_comments(Some("   ".into()), "reject").is_err());
        assert_eq!(
            required_comments(Some(" ok ".into()), "reject").unwrap(),
            "ok"
        );
    }

    fn status() -> impl Strategy<Value = SignoffStatus> {
        prop_oneof![Just(Pending), Just(Approved), Just(Rejected), Just(Delegated)]
    }

    proptest! {
        #[test]
        fn prop_reduction_is_order_independent(
            mut statuses in prop::collection::vec(status(), 1..8)
        ) {
            let forward = reduce_round(statuses.clone());
            statuses.reverse();
            prop_assert_eq!(forward, reduce_round(statuses));
        }

        #[test]
        fn prop_approved_iff_all_approved(statuses in prop::collection::vec(status(), 1..8)) {
            let approved = reduce_round(statuses.clone()) == ArtifactStatus::Approved;
            prop_assert_eq!(approved, statuses.iter().all(|s| *s == Approved));
        }

        #[test]
        fn prop_rejected_iff_any_rejected(statuses in prop::collection::vec(status(), 1..8)) {
            let rejected = reduce_round(statuses.clone()) == ArtifactStatus::Rejected;
            prop_assert_eq!(rejected, statuses.iter().any(|s| *s == Rejected));
        }
    }
}
