use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalResolution, Policy, PolicyForm, PolicyId,
    PolicyPatch, PolicyStatus,
};
use super::error::{LifecycleError, ValidationError};
use super::lifecycle::{ApprovalReason, PolicyLifecycle, SaveVerdict};
use crate::workflows::context::MemberId;

static APPROVAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_approval_request_id() -> ApprovalRequestId {
    let id = APPROVAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApprovalRequestId(format!("apr-{id:06}"))
}

/// Write a form edit straight to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectUpdateCommand {
    pub policy_id: PolicyId,
    pub expected_version: u64,
    pub changes: PolicyPatch,
}

/// Route a form edit through the approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequestCommand {
    pub policy_id: PolicyId,
    pub expected_version: u64,
    pub approver_id: MemberId,
    pub proposed: PolicyPatch,
    pub reason: ApprovalReason,
}

impl ApprovalRequestCommand {
    /// Write applied when the request is submitted. Proposed values stay on the
    /// request until confirmation.
    pub fn submission_patch(&self) -> PolicyPatch {
        PolicyPatch {
            status: Some(PolicyStatus::NeedsReview),
            approver_id: Some(Some(self.approver_id.clone())),
            ..PolicyPatch::default()
        }
    }

    pub fn into_request(
        self,
        current: &Policy,
        requested_by: MemberId,
        now: DateTime<Utc>,
    ) -> ApprovalRequest {
        ApprovalRequest {
            id: next_approval_request_id(),
            policy_id: self.policy_id,
            organization_id: current.organization_id.clone(),
            approver_id: self.approver_id,
            requested_by,
            proposed: self.proposed,
            previous_status: current.status,
            previous_approver_id: current.approver_id.clone(),
            created_at: now,
            resolution: ApprovalResolution::Pending,
            resolved_at: None,
        }
    }
}

/// Approval-bound edit still waiting for an approver to be chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDraft {
    pub policy_id: PolicyId,
    pub expected_version: u64,
    pub proposed: PolicyPatch,
    pub reason: ApprovalReason,
}

impl ApprovalDraft {
    pub fn with_approver(
        self,
        approver_id: Option<MemberId>,
    ) -> Result<ApprovalRequestCommand, ValidationError> {
        let approver_id = approver_id.ok_or(ValidationError::ApproverRequired)?;
        Ok(ApprovalRequestCommand {
            policy_id: self.policy_id,
            expected_version: self.expected_version,
            approver_id,
            proposed: self.proposed,
            reason: self.reason,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveKind {
    Unchanged,
    Direct,
    NeedsApproval,
}

/// Outcome of planning a policy save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavePlan {
    Unchanged,
    Direct(DirectUpdateCommand),
    NeedsApproval(ApprovalDraft),
}

impl SavePlan {
    pub fn kind(&self) -> SaveKind {
        match self {
            SavePlan::Unchanged => SaveKind::Unchanged,
            SavePlan::Direct(_) => SaveKind::Direct,
            SavePlan::NeedsApproval(_) => SaveKind::NeedsApproval,
        }
    }

    pub fn changes(&self) -> Option<&PolicyPatch> {
        match self {
            SavePlan::Unchanged => None,
            SavePlan::Direct(command) => Some(&command.changes),
            SavePlan::NeedsApproval(draft) => Some(&draft.proposed),
        }
    }
}

/// Command ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCommand {
    Direct(DirectUpdateCommand),
    RequestApproval(ApprovalRequestCommand),
}

/// Translates lifecycle verdicts into store commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalRequestBuilder;

impl ApprovalRequestBuilder {
    pub fn plan(current: &Policy, verdict: SaveVerdict) -> SavePlan {
        match verdict {
            SaveVerdict::Unchanged => SavePlan::Unchanged,
            SaveVerdict::Direct { changes } => SavePlan::Direct(DirectUpdateCommand {
                policy_id: current.id.clone(),
                expected_version: current.version,
                changes,
            }),
            SaveVerdict::RequiresApproval { changes, reason } => {
                SavePlan::NeedsApproval(ApprovalDraft {
                    policy_id: current.id.clone(),
                    expected_version: current.version,
                    proposed: changes,
                    reason,
                })
            }
        }
    }

    /// Build the command for a verdict. `Ok(None)` for a no-op edit.
    pub fn build(
        current: &Policy,
        verdict: SaveVerdict,
        approver_id: Option<MemberId>,
    ) -> Result<Option<PolicyCommand>, ValidationError> {
        match Self::plan(current, verdict) {
            SavePlan::Unchanged => Ok(None),
            SavePlan::Direct(command) => Ok(Some(PolicyCommand::Direct(command))),
            SavePlan::NeedsApproval(draft) => draft
                .with_approver(approver_id)
                .map(|command| Some(PolicyCommand::RequestApproval(command))),
        }
    }
}

/// Plan how a submitted form is saved against the persisted policy.
pub fn plan_policy_save(
    current: &Policy,
    pending: Option<&ApprovalRequest>,
    form: &PolicyForm,
) -> Result<SavePlan, LifecycleError> {
    let verdict = PolicyLifecycle::evaluate_save(current, pending, form)?;
    Ok(ApprovalRequestBuilder::plan(current, verdict))
}
