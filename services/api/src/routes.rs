use crate::infra::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use compliance_engine::error::AppError;
use compliance_engine::workflows::compliance::{
    compliance_router, ComplianceReadService, ComplianceSnapshot, ComplianceStore,
    FrameworkComplianceView, FrameworkInstanceId,
};
use compliance_engine::workflows::policies::{policy_router, PolicyApprovalService, PolicyStore};
use compliance_engine::workflows::OrganizationContext;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Snapshot scoring request. The organization comes from the request headers.
#[derive(Debug, Deserialize)]
pub(crate) struct FrameworkReportRequest {
    pub(crate) framework_instance_id: FrameworkInstanceId,
    pub(crate) snapshot: ComplianceSnapshot,
}

pub(crate) fn with_compliance_routes<P, C>(
    policies: Arc<PolicyApprovalService<P>>,
    compliance: Arc<ComplianceReadService<C>>,
) -> axum::Router
where
    P: PolicyStore + 'static,
    C: ComplianceStore + 'static,
{
    policy_router(policies)
        .merge(compliance_router(compliance))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/reports/framework",
            axum::routing::post(framework_report_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Score an uploaded snapshot without touching the live store.
pub(crate) async fn framework_report_endpoint(
    headers: HeaderMap,
    Json(payload): Json<FrameworkReportRequest>,
) -> Result<Json<FrameworkComplianceView>, axum::response::Response> {
    let ctx = OrganizationContext::from_headers(&headers).map_err(|err| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
    })?;

    let FrameworkReportRequest {
        framework_instance_id,
        snapshot,
    } = payload;

    let service = ComplianceReadService::new(Arc::new(snapshot));
    service
        .framework_compliance(&ctx, &framework_instance_id)
        .map(Json)
        .map_err(|err| AppError::from(err).into_response())
}
