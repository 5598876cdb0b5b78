use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;

use super::domain::{ControlId, FrameworkInstanceId};
use super::repository::ComplianceStore;
use super::service::{ComplianceReadService, ComplianceServiceError};
use crate::workflows::context::OrganizationContext;
use crate::workflows::policies::router::context_error_response;

/// Router builder exposing control progress and framework compliance.
pub fn compliance_router<S>(service: Arc<ComplianceReadService<S>>) -> Router
where
    S: ComplianceStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/controls/:control_id/progress",
            get(control_progress_handler::<S>),
        )
        .route(
            "/api/v1/frameworks/:framework_instance_id/compliance",
            get(framework_compliance_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn control_progress_handler<S>(
    State(service): State<Arc<ComplianceReadService<S>>>,
    Path(control_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ComplianceStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.control_progress(&ctx, &ControlId(control_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn framework_compliance_handler<S>(
    State(service): State<Arc<ComplianceReadService<S>>>,
    Path(framework_instance_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ComplianceStore + 'static,
{
    let ctx = match OrganizationContext::from_headers(&headers) {
        Ok(ctx) => ctx,
        Err(error) => return context_error_response(error),
    };

    match service.framework_compliance(&ctx, &FrameworkInstanceId(framework_instance_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

fn service_error_response(error: ComplianceServiceError) -> Response {
    let status = match &error {
        ComplianceServiceError::ControlNotFound(_)
        | ComplianceServiceError::FrameworkNotFound(_) => StatusCode::NOT_FOUND,
        ComplianceServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
