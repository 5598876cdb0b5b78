use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::context::{MemberId, OrganizationContext, OrganizationId};
use crate::workflows::policies::domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalResolution, Department, Member, Policy,
    PolicyForm, PolicyId, PolicyPatch, PolicyStatus, ReviewFrequency,
};
use crate::workflows::policies::repository::PolicyStore;
use crate::workflows::policies::service::PolicyApprovalService;
use crate::workflows::store::RepositoryError;

pub(super) const ORG: &str = "org-acme";
pub(super) const OTHER_ORG: &str = "org-globex";
pub(super) const EDITOR: &str = "mem-editor";
pub(super) const APPROVER: &str = "mem-approver";
pub(super) const INACTIVE: &str = "mem-inactive";
pub(super) const OUTSIDER: &str = "mem-outsider";

pub(super) fn ctx() -> OrganizationContext {
    OrganizationContext::new(ORG, EDITOR)
}

pub(super) fn approver_ctx() -> OrganizationContext {
    OrganizationContext::new(ORG, APPROVER)
}

pub(super) fn member_id(id: &str) -> MemberId {
    MemberId(id.to_string())
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn now() -> DateTime<Utc> {
    at(2025, 3, 14, 9)
}

pub(super) fn policy(id: &str, status: PolicyStatus) -> Policy {
    Policy {
        id: PolicyId(id.to_string()),
        organization_id: OrganizationId(ORG.to_string()),
        name: "Access Control Policy".to_string(),
        description: "Who may access production systems.".to_string(),
        status,
        is_archived: false,
        archived_at: None,
        assignee_id: Some(member_id(EDITOR)),
        approver_id: None,
        department: Department::It,
        review_frequency: ReviewFrequency::Yearly,
        review_date: at(2025, 6, 1, 12),
        is_required_to_sign: false,
        version: 1,
    }
}

pub(super) fn members() -> Vec<Member> {
    vec![
        Member {
            id: member_id(EDITOR),
            organization_id: OrganizationId(ORG.to_string()),
            name: "Erin Editor".to_string(),
            active: true,
        },
        Member {
            id: member_id(APPROVER),
            organization_id: OrganizationId(ORG.to_string()),
            name: "Alex Approver".to_string(),
            active: true,
        },
        Member {
            id: member_id(INACTIVE),
            organization_id: OrganizationId(ORG.to_string()),
            name: "Ivan Inactive".to_string(),
            active: false,
        },
        Member {
            id: member_id(OUTSIDER),
            organization_id: OrganizationId(OTHER_ORG.to_string()),
            name: "Olga Outsider".to_string(),
            active: true,
        },
    ]
}

pub(super) fn publish_form(policy: &Policy) -> PolicyForm {
    PolicyForm {
        status: PolicyStatus::Published,
        ..policy.form()
    }
}

/// Pending request as the service would have created it for `policy`.
pub(super) fn pending_request(policy: &Policy, proposed: PolicyPatch) -> ApprovalRequest {
    ApprovalRequest {
        id: ApprovalRequestId("apr-test-1".to_string()),
        policy_id: policy.id.clone(),
        organization_id: policy.organization_id.clone(),
        approver_id: member_id(APPROVER),
        requested_by: member_id(EDITOR),
        proposed,
        previous_status: policy.status,
        previous_approver_id: policy.approver_id.clone(),
        created_at: now(),
        resolution: ApprovalResolution::Pending,
        resolved_at: None,
    }
}

#[derive(Default)]
struct StoreState {
    policies: HashMap<PolicyId, Policy>,
    requests: Vec<ApprovalRequest>,
}

/// In-memory policy store with version checks, scoped by organization.
#[derive(Default)]
pub(super) struct MemoryPolicyStore {
    state: Mutex<StoreState>,
    members: Vec<Member>,
}

impl MemoryPolicyStore {
    pub(super) fn with_policies(policies: Vec<Policy>) -> Self {
        let store = Self {
            state: Mutex::new(StoreState::default()),
            members: members(),
        };
        {
            let mut state = store.state.lock().expect("store mutex poisoned");
            for policy in policies {
                state.policies.insert(policy.id.clone(), policy);
            }
        }
        store
    }

    pub(super) fn policy(&self, id: &str) -> Policy {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .policies
            .get(&PolicyId(id.to_string()))
            .cloned()
            .expect("policy seeded")
    }

    pub(super) fn requests(&self) -> Vec<ApprovalRequest> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .requests
            .clone()
    }

    /// Store a request without touching its policy.
    pub(super) fn insert_request(&self, request: ApprovalRequest) {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .requests
            .push(request);
    }

    /// Simulate another editor writing in between.
    pub(super) fn bump_version(&self, id: &str) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if let Some(policy) = state.policies.get_mut(&PolicyId(id.to_string())) {
            policy.version += 1;
        }
    }
}

fn write(
    state: &mut StoreState,
    ctx: &OrganizationContext,
    id: &PolicyId,
    expected_version: u64,
    patch: &PolicyPatch,
) -> Result<Policy, RepositoryError> {
    let policy = state
        .policies
        .get_mut(id)
        .filter(|policy| policy.organization_id == ctx.organization_id)
        .ok_or(RepositoryError::NotFound)?;
    if policy.version != expected_version {
        return Err(RepositoryError::Conflict);
    }
    policy.apply(patch);
    policy.version += 1;
    Ok(policy.clone())
}

impl PolicyStore for MemoryPolicyStore {
    fn get_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .policies
            .get(id)
            .filter(|policy| policy.organization_id == ctx.organization_id)
            .cloned())
    }

    fn update_policy(
        &self,
        ctx: &OrganizationContext,
        id: &PolicyId,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<Policy, RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        write(&mut state, ctx, id, expected_version, patch)
    }

    fn find_member(
        &self,
        _ctx: &OrganizationContext,
        id: &MemberId,
    ) -> Result<Option<Member>, RepositoryError> {
        Ok(self.members.iter().find(|member| member.id == *id).cloned())
    }

    fn pending_approval(
        &self,
        ctx: &OrganizationContext,
        policy_id: &PolicyId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .requests
            .iter()
            .find(|request| {
                request.policy_id == *policy_id
                    && request.organization_id == ctx.organization_id
                    && request.is_pending()
            })
            .cloned())
    }

    fn create_approval_request(
        &self,
        ctx: &OrganizationContext,
        request: ApprovalRequest,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state
            .requests
            .iter()
            .any(|existing| existing.policy_id == request.policy_id && existing.is_pending())
        {
            return Err(RepositoryError::Conflict);
        }
        let policy = write(&mut state, ctx, &request.policy_id, expected_version, patch)?;
        state.requests.push(request.clone());
        Ok((policy, request))
    }

    fn resolve_approval_request(
        &self,
        ctx: &OrganizationContext,
        id: &ApprovalRequestId,
        resolution: ApprovalResolution,
        resolved_at: DateTime<Utc>,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let index = state
            .requests
            .iter()
            .position(|request| request.id == *id && request.is_pending())
            .ok_or(RepositoryError::NotFound)?;
        let policy_id = state.requests[index].policy_id.clone();
        let policy = write(&mut state, ctx, &policy_id, expected_version, patch)?;

        let request = &mut state.requests[index];
        request.resolution = resolution;
        request.resolved_at = Some(resolved_at);
        Ok((policy, request.clone()))
    }
}

/// Store whose every call fails as if the database were down.
pub(super) struct UnavailableStore;

impl PolicyStore for UnavailableStore {
    fn get_policy(
        &self,
        _ctx: &OrganizationContext,
        _id: &PolicyId,
    ) -> Result<Option<Policy>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn update_policy(
        &self,
        _ctx: &OrganizationContext,
        _id: &PolicyId,
        _expected_version: u64,
        _patch: &PolicyPatch,
    ) -> Result<Policy, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn find_member(
        &self,
        _ctx: &OrganizationContext,
        _id: &MemberId,
    ) -> Result<Option<Member>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn pending_approval(
        &self,
        _ctx: &OrganizationContext,
        _policy_id: &PolicyId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn create_approval_request(
        &self,
        _ctx: &OrganizationContext,
        _request: ApprovalRequest,
        _expected_version: u64,
        _patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn resolve_approval_request(
        &self,
        _ctx: &OrganizationContext,
        _id: &ApprovalRequestId,
        _resolution: ApprovalResolution,
        _resolved_at: DateTime<Utc>,
        _expected_version: u64,
        _patch: &PolicyPatch,
    ) -> Result<(Policy, ApprovalRequest), RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }
}

pub(super) fn build_service(
    policies: Vec<Policy>,
) -> (PolicyApprovalService<MemoryPolicyStore>, Arc<MemoryPolicyStore>) {
    let store = Arc::new(MemoryPolicyStore::with_policies(policies));
    (PolicyApprovalService::new(store.clone()), store)
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
