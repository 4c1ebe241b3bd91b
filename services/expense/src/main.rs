use anyhow::Context;
use expense_service::{create_router, AppState, ExpenseService, EXPENSE_QUEUE};
use shared::broker::Broker;
use shared::config::Settings;
use shared::dispatcher::RequestDispatcher;
use shared::jwt::TokenIssuer;
use shared::logger::init_logger;
use shared::nats::NatsBroker;
use shared::router::CommandRouter;
use shared::shutdown::{shutdown_signal, spawn_worker, stop_worker};
use shared::store::open_store;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load("expense").context("failed to load settings")?;
    init_logger(settings.log_json);

    let broker: Arc<dyn Broker> = Arc::new(
        NatsBroker::connect(&settings.nats_url)
            .await
            .context("failed to connect to NATS")?,
    );
    let store = open_store(settings.database_url(), "expenses")
        .await
        .context("failed to open expense store")?;
    let ttl = chrono::Duration::from_std(settings.token_ttl()?)?;
    let tokens = TokenIssuer::new(&settings.jwt_secret, ttl);

    let worker_stop = CancellationToken::new();
    let server_stop = CancellationToken::new();
    let router = CommandRouter::new(broker.clone(), EXPENSE_QUEUE, ExpenseService::new(store));
    let worker = spawn_worker(router, worker_stop.clone(), server_stop.clone());

    let dispatcher = RequestDispatcher::new(broker.clone(), EXPENSE_QUEUE, settings.call_timeout());
    let deadline_ms = dispatcher.deadline().as_millis() as u64;
    let app = create_router(AppState::new(dispatcher, tokens));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;
    tracing::info!(port = settings.port, deadline_ms, "Expense service is running.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_stop))
        .await?;

    tracing::info!("Expense service is stopping.");
    stop_worker(&worker_stop, worker).await;
    broker.close().await?;
    tracing::info!("Expense service is stopped.");
    Ok(())
}
