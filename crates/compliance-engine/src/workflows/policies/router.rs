use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::approval::{SaveKind, SavePlan};
use super::domain::{PolicyForm, PolicyId, PolicyPatch};
use super::lifecycle::ApprovalReason;
use super::repository::PolicyStore;
use super::service::{PolicyApprovalService, PolicyServiceError, SavePolicyRequest};
use crate::workflows::context::{ContextError, MemberId, OrganizationContext};
use crate::workflows::store::RepositoryError;

/// Router builder exposing policy editing and approval endpoints.
pub fn policy_router<S>(service: Arc<PolicyApprovalService<S>>) -> Router
where
    S: PolicyStore + 'static,
{
    Router::new()
        .route("/api/v1/policies/:policy_id", get(detail_handler::<S>))
        .route("/api/v1/policies/:policy_id/plan", post(plan_handler::<S>))
        .route("/api/v1/policies/:policy_id/save", post(save_handler::<S>))
        .route(
            "/api/v1/policies/:policy_id/approval/confirm",
            post(confirm_handler::<S>),
        )
        .route(
            "/api/v1/policies/:policy_id/approval/cancel",
            post(cancel_handler::<S>),
        )
        .route(
            "/api/v1/policies/:policy_id/archive",
            post(archive_handler::<S>),
        )
        .route(
            "/api/v1/policies/:policy_id/restore",
            post(restore_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmApprovalPayload {
    #[serde(default)]
    pub approver_id: Option<MemberId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavePlanView {
    pub kind: SaveKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<PolicyPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ApprovalReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_summary: Option<String>,
}

impl From<&SavePlan> for SavePlanView {
    fn from(plan: &SavePlan) -> Self {
        let reason = match plan {
            SavePlan::NeedsApproval(draft) => Some(draft.reason.clone()),
            SavePlan::Unchanged | SavePlan::Direct(_) => None,
        };

        Self {
            kind: plan.kind(),
            changes: plan.changes().cloned(),
            reason_summary: reason.as_ref().map(ApprovalReason::summary),
            reason,
        }
    }
}

pub(crate) async fn detail_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.get(&ctx, &PolicyId(policy_id)) {
        Ok(record) => {
            let view = record.view(Utc::now().date_naive());
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn plan_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
    axum::Json(form): axum::Json<PolicyForm>,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.plan(&ctx, &PolicyId(policy_id), &form) {
        Ok(plan) => (StatusCode::OK, axum::Json(SavePlanView::from(&plan))).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn save_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SavePolicyRequest>,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.save(&ctx, &PolicyId(policy_id), request, Utc::now()) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn confirm_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<ConfirmApprovalPayload>,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.confirm_approval(
        &ctx,
        &PolicyId(policy_id),
        payload.approver_id.as_ref(),
        Utc::now(),
    ) {
        Ok(policy) => (StatusCode::OK, axum::Json(policy)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn cancel_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.cancel_approval(&ctx, &PolicyId(policy_id), Utc::now()) {
        Ok(policy) => (StatusCode::OK, axum::Json(policy)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn archive_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.archive(&ctx, &PolicyId(policy_id), Utc::now()) {
        Ok(policy) => (StatusCode::OK, axum::Json(policy)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn restore_handler<S>(
    State(service): State<Arc<PolicyApprovalService<S>>>,
    Path(policy_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: PolicyStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.restore(&ctx, &PolicyId(policy_id)) {
        Ok(policy) => (StatusCode::OK, axum::Json(policy)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) fn context_error_response(error: ContextError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn service_error_response(error: PolicyServiceError) -> Response {
    let (status, message) = match &error {
        PolicyServiceError::Validation(err) => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.user_message())
        }
        PolicyServiceError::Conflict(err) => (StatusCode::CONFLICT, err.user_message()),
        PolicyServiceError::NotFound(_)
        | PolicyServiceError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, "Policy not found".to_string())
        }
        PolicyServiceError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong, please try again".to_string(),
        ),
    };

    let payload = json!({
        "error": error.to_string(),
        "message": message,
    });
    (status, axum::Json(payload)).into_response()
}
