use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use moveleads::config::AppConfig;
use moveleads::error::AppError;
use moveleads::marketplace::{
    InMemoryMarketplaceStore, Marketplace, NotificationQueue, TracingNotifier,
};
use moveleads::telemetry;
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

    let store = Arc::new(InMemoryMarketplaceStore::new());
    let (notifications, _notification_worker) = NotificationQueue::spawn(Arc::new(TracingNotifier));
    let marketplace = Arc::new(Marketplace::new(
        store,
        Arc::new(notifications),
        &config.marketplace,
    ));

    let app = with_marketplace_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        low_credit_threshold = %config.marketplace.low_credit_threshold,
        "lead marketplace ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
