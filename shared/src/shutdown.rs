//! Process shutdown ordering.
//!
//! The HTTP server drains first while the worker keeps answering, so
//! in-flight calls still get their replies. The worker is cancelled only
//! after the server has returned.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::BrokerError;
use crate::router::{CommandHandler, CommandRouter};

/// Resolve on ctrl-c, SIGTERM or `server_stop` being cancelled.
///
/// Nothing is cancelled here; pass this to the server's graceful shutdown.
pub async fn shutdown_signal(server_stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = server_stop.cancelled() => {},
    }

    tracing::info!("shutdown signal received, draining requests");
}

/// Run `router` on its own task until `worker_stop` fires.
///
/// If the router ends by itself (the broker closed its queue), `server_stop`
/// is cancelled so the gateway does not outlive its worker.
pub fn spawn_worker<H>(
    router: CommandRouter<H>,
    worker_stop: CancellationToken,
    server_stop: CancellationToken,
) -> JoinHandle<Result<(), BrokerError>>
where
    H: CommandHandler + 'static,
{
    tokio::spawn(async move {
        let result = router.run(worker_stop).await;
        server_stop.cancel();
        result
    })
}

/// Cancel the worker and wait for its loop to finish.
pub async fn stop_worker(worker_stop: &CancellationToken, worker: JoinHandle<Result<(), BrokerError>>) {
    worker_stop.cancel();
    match worker.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "worker failed"),
        Err(err) => tracing::error!(error = %err, "worker task aborted"),
    }
}
