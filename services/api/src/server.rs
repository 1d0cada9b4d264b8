use crate::cli::ServeArgs;
use crate::infra::{
    lender_recipients, AppState, InMemoryDocumentStore, InMemoryLoanRepository,
    LogNotificationDispatcher, NullValuationProvider,
};
use crate::routes::with_loan_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Duration;
use lendflow::config::AppConfig;
use lendflow::error::AppError;
use lendflow::links::ActionLinkCodec;
use lendflow::telemetry;
use lendflow::workflows::underwriting::{LoanWorkflowService, UnderwritingRules};
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

    let repository = Arc::new(InMemoryLoanRepository::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let dispatcher = Arc::new(LogNotificationDispatcher);
    let valuations = Arc::new(NullValuationProvider);
    let loan_service = Arc::new(LoanWorkflowService::new(
        repository,
        documents,
        dispatcher,
        valuations,
        UnderwritingRules::default(),
        ActionLinkCodec::new(config.links.secret.clone()),
        Duration::days(config.links.ttl_days),
        lender_recipients(),
    ));

    let app = with_loan_routes(loan_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
