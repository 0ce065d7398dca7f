use crate::cli::ServeArgs;
use crate::infra::{AppState, OpportunityBundle};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use proposal_scoring::config::AppConfig;
use proposal_scoring::error::AppError;
use proposal_scoring::evaluation::{InMemoryScoringStore, ScoringService};
use proposal_scoring::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
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

    let engine = config.engine();
    engine.validate()?;

    let store = Arc::new(InMemoryScoringStore::default());
    if let Some(path) = args.bundle.take() {
        let scope = OpportunityBundle::from_path(&path)?.seed(&store)?;
        info!(opportunity = %scope, bundle = %path.display(), "opportunity bundle preloaded");
    }
    let scoring_service = Arc::new(ScoringService::new(store, engine));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_scoring_routes(scoring_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "proposal scoring engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
