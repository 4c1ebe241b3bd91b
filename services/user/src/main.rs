use anyhow::Context;
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
use user_service::{create_router, AppState, UserService, USER_QUEUE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load("user").context("failed to load settings")?;
    init_logger(settings.log_json);

    let broker: Arc<dyn Broker> = Arc::new(
        NatsBroker::connect(&settings.nats_url)
            .await
            .context("failed to connect to NATS")?,
    );
    let store = open_store(settings.database_url(), "users")
        .await
        .context("failed to open user store")?;
    let ttl = chrono::Duration::from_std(settings.token_ttl()?)?;
    let tokens = TokenIssuer::new(&settings.jwt_secret, ttl);

    let worker_stop = CancellationToken::new();
    let server_stop = CancellationToken::new();
    let router = CommandRouter::new(broker.clone(), USER_QUEUE, UserService::new(store, tokens));
    let worker = spawn_worker(router, worker_stop.clone(), server_stop.clone());

    let dispatcher = RequestDispatcher::new(broker.clone(), USER_QUEUE, settings.call_timeout());
    let deadline_ms = dispatcher.deadline().as_millis() as u64;
    let app = create_router(AppState::new(dispatcher));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;
    tracing::info!(port = settings.port, deadline_ms, "User service is running.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_stop))
        .await?;

    tracing::info!("User service is stopping.");
    stop_worker(&worker_stop, worker).await;
    broker.close().await?;
    tracing::info!("User service is stopped.");
    Ok(())
}
