use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalResolution, Member, Policy, PolicyId, PolicyPatch,
};
use super::lifecycle::PolicyState;
use crate::workflows::context::{MemberId, OrganizationContext};
use crate::workflows::store::RepositoryError;

/// Storage abstraction for policies and their approval requests.
///
/// Every write carries the policy version the caller read. Implementations apply
/// the write and the version check as one transaction and return
/// `RepositoryError::Conflict` when the persisted version moved on.
pub trait PolicyStore: Send + Sync {
    fn get_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError>;

    fn update_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<Policy, RepositoryError>;

    fn find_member(
        &self,
        ctx: &OrganizationContext,
        id: &MemberId,
    ) -> Result<Option<Member>, RepositoryError>;

    fn pending_approval(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError>;

    /// Insert a pending request and apply `patch` to its policy. Fails with
    /// `Conflict` if another request is pending for the same policy.
    fn create_approval_request(
        &self,
        ctx: &OrganizationContext,
        request: ApprovalRequest,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError>;

    /// Resolve a pending request and apply `patch` to its policy.
    fn resolve_approval_request(
        &self,
        ctx: &OrganizationContext,
        id: &ApprovalRequestId,
        resolution: ApprovalResolution,
        resolved_at: DateTime<Utc>,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError>;
}

/// Policy plus its outstanding approval, as loaded by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRecord {
    pub policy: Policy,
    pub pending_approval: Option<ApprovalRequest>,
}

impl PolicyRecord {
    pub fn view(&self, today: NaiveDate) -> PolicyView {
        let state = PolicyState::of(&self.policy, self.pending_approval.as_ref());
        PolicyView {
            state_label: state.label(),
            state,
            review_overdue: self.policy.review_overdue(today),
            next_review_due: self.policy.next_review_due(),
            policy: self.policy.clone(),
            pending_approval: self.pending_approval.clone(),
        }
    }
}

/// Policy as exposed to the policy detail page.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyView {
    pub policy: Policy,
    pub state: PolicyState,
    pub state_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_approval: Option<ApprovalRequest>,
    pub review_overdue: bool,
    pub next_review_due: Option<NaiveDate>,
}
