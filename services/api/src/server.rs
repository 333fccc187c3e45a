use crate::cli::ServeArgs;
use crate::infra::{
    access_gate, subscription_gate, AppState, InMemoryDiagnosticRepository, ManagerChatNotifier,
};
use crate::routes::with_diagnostic_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use teremok::config::{AppConfig, DiagnosticsConfig};
use teremok::diagnostics::{Catalogs, DiagnosticService};
use teremok::error::AppError;
use teremok::telemetry;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(dir) = args.catalog_dir.take() {
        config.diagnostics.catalog_dir = Some(dir);
    }

    telemetry::init(&config.telemetry)?;

    let catalogs = Arc::new(Catalogs::load(config.diagnostics.catalog_dir.as_deref())?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));

    if config.diagnostics.manager_chat_id.is_none() {
        warn!("APP_MANAGER_CHAT_ID not set; operator notifications will be skipped");
    }

    let app = build_app(
        &config.diagnostics,
        catalogs,
        readiness_flag.clone(),
        prometheus_handle,
    )
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "teremok diagnostics service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Wires the in-memory adapters, the access gate and every route.
pub(crate) fn build_app(
    config: &DiagnosticsConfig,
    catalogs: Arc<Catalogs>,
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
) -> axum::Router {
    let subscriptions = subscription_gate(config);
    let repository = Arc::new(InMemoryDiagnosticRepository::default());
    let notifier = Arc::new(ManagerChatNotifier::new(config.manager_chat_id));
    let diagnostic_service = Arc::new(
        DiagnosticService::new(catalogs, repository, notifier)
            .with_access_gate(access_gate(subscriptions.as_ref())),
    );

    let app_state = AppState {
        readiness,
        metrics: Arc::new(metrics),
        subscriptions,
    };

    with_diagnostic_routes(diagnostic_service).layer(Extension(app_state))
}
