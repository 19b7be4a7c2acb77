use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryCardSystem};
use crate::routes::with_card_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use card_core::cards::{CardService, Clock, Collaborators, SystemClock};
use card_core::config::AppConfig;
use card_core::error::AppError;
use card_core::telemetry;
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

    let clock = Arc::new(SystemClock::new(config.cards.local_offset));
    let backend = Arc::new(InMemoryCardSystem::seeded(clock.today()));
    let card_service = Arc::new(CardService::new(
        Collaborators::from_backend(backend),
        Arc::new(config.cards.replacement),
        clock,
    ));

    let app = with_card_routes(card_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        replacement = ?config.cards.replacement,
        "card service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
