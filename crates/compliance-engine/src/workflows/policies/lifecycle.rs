use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    ApprovalRequest, ApprovalRequestId, MaterialField, Member, Policy, PolicyForm, PolicyPatch,
    PolicyStatus,
};
use super::error::{ConflictError, LifecycleError, ValidationError};
use crate::workflows::context::{MemberId, OrganizationId};

/// Whether an approval request is outstanding for the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalState {
    None,
    Pending {
        request_id: ApprovalRequestId,
        approver_id: MemberId,
    },
}

/// Lifecycle position of a policy: status × archived × approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyState {
    pub status: PolicyStatus,
    pub archived: bool,
    pub approval: ApprovalState,
}

impl PolicyState {
    pub fn of(policy: &Policy, pending: Option<&ApprovalRequest>) -> Self {
        let approval = match pending.filter(|request| request.is_pending()) {
            Some(request) => ApprovalState::Pending {
                request_id: request.id.clone(),
                approver_id: request.approver_id.clone(),
            },
            None => ApprovalState::None,
        };

        Self {
            status: policy.status,
            archived: policy.is_archived,
            approval,
        }
    }

    pub fn label(&self) -> &'static str {
        match (&self.approval, self.status) {
            (ApprovalState::Pending { .. }, _) => "pending_approval",
            (ApprovalState::None, status) => status.label(),
        }
    }
}

/// Why a save has to pass through the approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "fields", rename_all = "snake_case")]
pub enum ApprovalReason {
    PublishRequested,
    MaterialChange(Vec<MaterialField>),
}

impl ApprovalReason {
    pub fn summary(&self) -> String {
        match self {
            ApprovalReason::PublishRequested => "publication requested".to_string(),
            ApprovalReason::MaterialChange(fields) => {
                let labels: Vec<&str> = fields.iter().map(|field| field.label()).collect();
                format!("material change to {}", labels.join(", "))
            }
        }
    }
}

/// Lifecycle verdict for a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveVerdict {
    Unchanged,
    Direct {
        changes: PolicyPatch,
    },
    RequiresApproval {
        changes: PolicyPatch,
        reason: ApprovalReason,
    },
}

/// Tracked fields that differ between the persisted policy and a change set.
///
/// Review dates compare by calendar day only. Name and description never count.
pub fn material_changes(current: &Policy, changes: &PolicyPatch) -> Vec<MaterialField> {
    let mut fields = Vec::new();

    if changes.status.is_some_and(|status| status != current.status) {
        fields.push(MaterialField::Status);
    }
    if changes
        .assignee_id
        .as_ref()
        .is_some_and(|assignee| *assignee != current.assignee_id)
    {
        fields.push(MaterialField::Assignee);
    }
    if changes
        .department
        .is_some_and(|department| department != current.department)
    {
        fields.push(MaterialField::Department);
    }
    if changes
        .review_frequency
        .is_some_and(|frequency| frequency != current.review_frequency)
    {
        fields.push(MaterialField::ReviewFrequency);
    }
    if changes
        .review_date
        .is_some_and(|date| date.date_naive() != current.review_date.date_naive())
    {
        fields.push(MaterialField::ReviewDate);
    }
    if changes
        .is_required_to_sign
        .is_some_and(|required| required != current.is_required_to_sign)
    {
        fields.push(MaterialField::RequiredToSign);
    }

    fields
}

/// Policy state machine. Stateless: every decision is a function of the snapshot
/// it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyLifecycle;

impl PolicyLifecycle {
    /// Decide how a submitted form is applied to the persisted policy.
    pub fn evaluate_save(
        current: &Policy,
        pending: Option<&ApprovalRequest>,
        form: &PolicyForm,
    ) -> Result<SaveVerdict, LifecycleError> {
        let state = PolicyState::of(current, pending);

        if state.archived {
            return Err(ValidationError::Archived.into());
        }
        if let ApprovalState::Pending { .. } = state.approval {
            return Err(ConflictError::ApprovalPending {
                policy_id: current.id.clone(),
            }
            .into());
        }

        let changes = PolicyPatch::diff(current, form);
        let verdict = match (state.status, form.status) {
            (from @ (PolicyStatus::Draft | PolicyStatus::Published), PolicyStatus::NeedsReview) => {
                return Err(ValidationError::InvalidTransition {
                    from,
                    to: PolicyStatus::NeedsReview,
                }
                .into());
            }
            (PolicyStatus::Published, PolicyStatus::Draft) => {
                return Err(ValidationError::InvalidTransition {
                    from: PolicyStatus::Published,
                    to: PolicyStatus::Draft,
                }
                .into());
            }
            (PolicyStatus::Draft | PolicyStatus::NeedsReview, PolicyStatus::Published) => {
                SaveVerdict::RequiresApproval {
                    changes,
                    reason: ApprovalReason::PublishRequested,
                }
            }
            (PolicyStatus::Draft | PolicyStatus::NeedsReview, _) => direct_or_unchanged(changes),
            (PolicyStatus::Published, PolicyStatus::Published) => {
                let fields = material_changes(current, &changes);
                if fields.is_empty() {
                    direct_or_unchanged(changes)
                } else {
                    SaveVerdict::RequiresApproval {
                        changes,
                        reason: ApprovalReason::MaterialChange(fields),
                    }
                }
            }
        };

        debug!(policy_id = %current.id, ?verdict, "evaluated policy save");
        Ok(verdict)
    }

    /// Check that the chosen approver is an active member of the acting organization.
    pub fn validate_approver(
        organization_id: &OrganizationId,
        approver_id: Option<&MemberId>,
        member: Option<&Member>,
    ) -> Result<MemberId, ValidationError> {
        let approver_id = approver_id.ok_or(ValidationError::ApproverRequired)?;

        match member {
            Some(member)
                if member.id == *approver_id
                    && member.organization_id == *organization_id
                    && member.active =>
            {
                Ok(approver_id.clone())
            }
            _ => Err(ValidationError::ApproverNotEligible(approver_id.clone())),
        }
    }

    /// Write that publishes the pending proposal.
    pub fn confirm(
        organization_id: &OrganizationId,
        pending: Option<&ApprovalRequest>,
        approver_id: Option<&MemberId>,
        approver: Option<&Member>,
    ) -> Result<PolicyPatch, LifecycleError> {
        let approver_id = Self::validate_approver(organization_id, approver_id, approver)?;
        let request = pending
            .filter(|request| request.is_pending())
            .ok_or(ValidationError::NoPendingApproval)?;

        if request.approver_id != approver_id {
            return Err(ValidationError::ApproverMismatch {
                expected: request.approver_id.clone(),
                found: approver_id,
            }
            .into());
        }

        Ok(request.confirmation_patch())
    }

    /// Write that abandons the pending proposal and restores the prior state.
    pub fn cancel(pending: Option<&ApprovalRequest>) -> Result<PolicyPatch, LifecycleError> {
        let request = pending
            .filter(|request| request.is_pending())
            .ok_or(ValidationError::NoPendingApproval)?;
        Ok(request.cancellation_patch())
    }

    /// Archive without touching status. `None` when already archived.
    pub fn archive(current: &Policy, now: DateTime<Utc>) -> Option<PolicyPatch> {
        if current.is_archived {
            return None;
        }
        Some(PolicyPatch {
            is_archived: Some(true),
            archived_at: Some(Some(now)),
            ..PolicyPatch::default()
        })
    }

    /// Restore without touching status. `None` when not archived.
    pub fn restore(current: &Policy) -> Option<PolicyPatch> {
        if !current.is_archived {
            return None;
        }
        Some(PolicyPatch {
            is_archived: Some(false),
            archived_at: Some(None),
            ..PolicyPatch::default()
        })
    }
}

fn direct_or_unchanged(changes: PolicyPatch) -> SaveVerdict {
    if changes.is_empty() {
        SaveVerdict::Unchanged
    } else {
        SaveVerdict::Direct { changes }
    }
}
