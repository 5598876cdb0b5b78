use super::domain::{PolicyId, PolicyStatus};
use crate::workflows::context::MemberId;

/// Incomplete user action or caller bug. Never accompanied by a partial write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("approver required")]
    ApproverRequired,
    #[error("approver {0} is not an active member of this organization")]
    ApproverNotEligible(MemberId),
    #[error("approver {found} does not match the requested approver {expected}")]
    ApproverMismatch { expected: MemberId, found: MemberId },
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: PolicyStatus,
        to: PolicyStatus,
    },
    #[error("policy is archived")]
    Archived,
    #[error("no approval is pending for this policy")]
    NoPendingApproval,
}

impl ValidationError {
    /// Inline form message.
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::ApproverRequired => "Approver is required".to_string(),
            ValidationError::ApproverNotEligible(_) => {
                "Approver must be an active member of your organization".to_string()
            }
            ValidationError::ApproverMismatch { .. } => {
                "Only the selected approver can approve this policy".to_string()
            }
            ValidationError::InvalidTransition { to, .. } => {
                format!("Policy cannot be moved to {to} directly")
            }
            ValidationError::Archived => "Restore the policy before editing it".to_string(),
            ValidationError::NoPendingApproval => {
                "This policy has no pending approval".to_string()
            }
        }
    }
}

/// Competing write. Callers re-fetch and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("policy {policy_id} already has a pending approval request")]
    ApprovalPending { policy_id: PolicyId },
    #[error("policy {policy_id} was modified concurrently")]
    ConcurrentUpdate { policy_id: PolicyId },
}

impl ConflictError {
    pub fn user_message(&self) -> String {
        match self {
            ConflictError::ApprovalPending { .. } => {
                "This policy is already waiting for approval".to_string()
            }
            ConflictError::ConcurrentUpdate { .. } => {
                "This policy was changed by someone else, please refresh.".to_string()
            }
        }
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
}
