use crate::cli::ServeArgs;
use crate::infra::{start_intake, AppState};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use risk_intake::config::AppConfig;
use risk_intake::error::AppError;
use risk_intake::telemetry;
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
    if let Some(dir) = args.static_dir.take() {
        config.intake.static_dir = Some(dir);
    }
    args.intake.apply(&mut config.intake);

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let runtime = start_intake(&config.intake);
    let app_state = AppState {
        readiness: runtime.readiness.clone(),
        metrics: Arc::new(prometheus_handle),
        static_dir: config.intake.static_dir.clone(),
    };

    let app = with_intake_routes(runtime.orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        ?config.environment,
        %addr,
        mappings = %config.intake.mappings_source,
        "risk intake service listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
