use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryStore};
use crate::routes::with_compliance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use compliance_engine::config::AppConfig;
use compliance_engine::error::AppError;
use compliance_engine::telemetry;
use compliance_engine::workflows::compliance::ComplianceReadService;
use compliance_engine::workflows::policies::PolicyApprovalService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = if config.store.seed_demo {
        info!("seeding demo organization");
        Arc::new(InMemoryStore::seeded())
    } else {
        Arc::new(InMemoryStore::default())
    };
    let policy_service = Arc::new(PolicyApprovalService::new(store.clone()));
    let compliance_service = Arc::new(ComplianceReadService::new(store));

    let app = with_compliance_routes(policy_service, compliance_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = config.environment.label(),
        %addr,
        "compliance engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
