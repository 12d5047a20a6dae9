use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_preflight_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use labelcheck::config::AppConfig;
use labelcheck::error::AppError;
use labelcheck::knowledge::KnowledgeBase;
use labelcheck::preflight::LabelPreflightService;
use labelcheck::telemetry;
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

    let knowledge = Arc::new(KnowledgeBase::load(&config.knowledge.dir));
    info!(docs = knowledge.docs().len(), "reference corpus loaded");

    let service = Arc::new(LabelPreflightService::from_config(&config, knowledge)?);

    let app = with_preflight_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "label preflight service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
