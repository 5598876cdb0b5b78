//! End-to-end policy lifecycle through the public service facade and HTTP router:
//! draft, submission, confirmation, copy edits, material edits, archival.

mod common {
    use std::sync::Mutex;

    use chrono::{DateTime, TimeZone, Utc};

    use compliance_engine::workflows::policies::{
        ApprovalRequest, ApprovalRequestId, ApprovalResolution, Department, Member, Policy,
        PolicyId, PolicyPatch, PolicyStatus, PolicyStore, ReviewFrequency,
    };
    use compliance_engine::workflows::{
        MemberId, OrganizationContext, OrganizationId, RepositoryError,
    };

    pub(super) const ORG: &str = "org-acme";

    pub(super) fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, 10, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    pub(super) fn ctx(member: &str) -> OrganizationContext {
        OrganizationContext::new(ORG, member)
    }

    pub(super) fn draft_policy() -> Policy {
        Policy {
            id: PolicyId("pol-incident".to_string()),
            organization_id: OrganizationId(ORG.to_string()),
            name: "Incident Response Policy".to_string(),
            description: "Escalation paths for security incidents.".to_string(),
            status: PolicyStatus::Draft,
            is_archived: false,
            archived_at: None,
            assignee_id: Some(MemberId("mem-owner".to_string())),
            approver_id: None,
            department: Department::It,
            review_frequency: ReviewFrequency::Yearly,
            review_date: at(1),
            is_required_to_sign: true,
            version: 0,
        }
    }

    #[derive(Default)]
    struct State {
        policies: Vec<Policy>,
        requests: Vec<ApprovalRequest>,
    }

    pub(super) struct MemoryStore {
        state: Mutex<State>,
        members: Vec<Member>,
    }

    impl MemoryStore {
        pub(super) fn new(policy: Policy) -> Self {
            let members = ["mem-owner", "mem-ciso"]
                .into_iter()
                .map(|id| Member {
                    id: MemberId(id.to_string()),
                    organization_id: OrganizationId(ORG.to_string()),
                    name: id.to_string(),
                    active: true,
                })
                .collect();
            Self {
                state: Mutex::new(State {
                    policies: vec![policy],
                    requests: Vec::new(),
                }),
                members,
            }
        }

        pub(super) fn request_count(&self) -> usize {
            self.state.lock().expect("store mutex poisoned").requests.len()
        }
    }

    fn write(
        state: &mut State,
        ctx: &OrganizationContext,
        id: &PolicyId,
        expected_version: u64,
        patch: &PolicyPatch,
    ) -> Result<Policy, RepositoryError> {
        let policy = state
            .policies
            .iter_mut()
            .find(|policy| policy.id == *id && policy.organization_id == ctx.organization_id)
            .ok_or(RepositoryError::NotFound)?;
        if policy.version != expected_version {
            return Err(RepositoryError::Conflict);
        }
        policy.apply(patch);
        policy.version += 1;
        Ok(policy.clone())
    }

    impl PolicyStore for MemoryStore {
        fn get_policy(
            &self,
            ctx: &OrganizationContext,
            id: &PolicyId,
        ) -> Result<Option<Policy>, RepositoryError> {
            let state = self.state.lock().expect("store mutex poisoned");
            Ok(state
                .policies
                .iter()
                .find(|policy| policy.id == *id && policy.organization_id == ctx.organization_id)
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
            _ctx: &OrganizationContext,
            policy_id: &PolicyId,
        ) -> Result<Option<ApprovalRequest>, RepositoryError> {
            let state = self.state.lock().expect("store mutex poisoned");
            Ok(state
                .requests
                .iter()
                .find(|request| request.policy_id == *policy_id && request.is_pending())
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
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use compliance_engine::workflows::context::{MEMBER_HEADER, ORGANIZATION_HEADER};
use compliance_engine::workflows::policies::{
    policy_router, Department, PolicyApprovalService, PolicyId, PolicyServiceError,
    PolicyStatus, SaveOutcome, SavePolicyRequest, ValidationError,
};
use compliance_engine::workflows::MemberId;

use common::*;

#[test]
fn policy_moves_through_the_full_lifecycle() {
    let store = Arc::new(MemoryStore::new(draft_policy()));
    let service = PolicyApprovalService::new(store.clone());
    let id = PolicyId("pol-incident".to_string());
    let owner = ctx("mem-owner");
    let ciso = MemberId("mem-ciso".to_string());

    let policy = service.get(&owner, &id).expect("loaded").policy;
    let mut form = policy.form();
    form.status = PolicyStatus::Published;
    let outcome = service
        .save(
            &owner,
            &id,
            SavePolicyRequest {
                form,
                expected_version: Some(policy.version),
                approver_id: Some(ciso.clone()),
            },
            at(2),
        )
        .expect("submitted");
    assert!(matches!(outcome, SaveOutcome::ApprovalRequested { .. }));
    assert_eq!(outcome.policy().status, PolicyStatus::NeedsReview);

    let published = service
        .confirm_approval(&ctx("mem-ciso"), &id, Some(&ciso), at(3))
        .expect("confirmed");
    assert_eq!(published.status, PolicyStatus::Published);
    assert_eq!(published.approver_id, Some(ciso.clone()));

    let mut copy_edit = published.form();
    copy_edit.description = "Escalation paths and on-call rotation.".to_string();
    let outcome = service
        .save(
            &owner,
            &id,
            SavePolicyRequest {
                form: copy_edit,
                expected_version: Some(published.version),
                approver_id: None,
            },
            at(4),
        )
        .expect("copy edit saved");
    let edited = match outcome {
        SaveOutcome::Updated { policy } => policy,
        other => panic!("expected direct update, got {other:?}"),
    };
    assert_eq!(edited.status, PolicyStatus::Published);

    let mut material = edited.form();
    material.department = Department::Gov;
    match service.save(
        &owner,
        &id,
        SavePolicyRequest {
            form: material.clone(),
            expected_version: Some(edited.version),
            approver_id: None,
        },
        at(5),
    ) {
        Err(PolicyServiceError::Validation(ValidationError::ApproverRequired)) => {}
        other => panic!("expected approver required, got {other:?}"),
    }
    service
        .save(
            &owner,
            &id,
            SavePolicyRequest {
                form: material,
                expected_version: Some(edited.version),
                approver_id: Some(ciso.clone()),
            },
            at(5),
        )
        .expect("material edit submitted");
    let republished = service
        .confirm_approval(&ctx("mem-ciso"), &id, Some(&ciso), at(6))
        .expect("confirmed");
    assert_eq!(republished.department, Department::Gov);
    assert_eq!(store.request_count(), 2);

    let archived = service.archive(&owner, &id, at(7)).expect("archived");
    assert!(archived.is_archived);
    let restored = service.restore(&owner, &id).expect("restored");
    assert!(!restored.is_archived);
    assert_eq!(restored.status, PolicyStatus::Published);
}

async fn send(
    router: axum::Router,
    method: &str,
    uri: &str,
    member: &str,
    body: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(ORGANIZATION_HEADER, ORG)
        .header(MEMBER_HEADER, member)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("request");
    let response = router.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn router_cancels_a_pending_submission() {
    let store = Arc::new(MemoryStore::new(draft_policy()));
    let router = policy_router(Arc::new(PolicyApprovalService::new(store)));
    let mut form = draft_policy().form();
    form.status = PolicyStatus::Published;

    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/v1/policies/pol-incident/save",
        "mem-owner",
        json!({ "form": form, "expected_version": 0, "approver_id": "mem-ciso" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["approver_id"], "mem-ciso");

    let (status, body) = send(
        router.clone(),
        "GET",
        "/api/v1/policies/pol-incident",
        "mem-owner",
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state_label"], "pending_approval");

    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/v1/policies/pol-incident/approval/cancel",
        "mem-owner",
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "draft");

    let (status, _) = send(
        router,
        "POST",
        "/api/v1/policies/pol-incident/approval/cancel",
        "mem-owner",
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
