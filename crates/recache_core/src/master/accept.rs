use std::{sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, debug, error, info, info_span, instrument};

use crate::{LifecycleError, worker::Coordinator, worker::handle_connection};

/// Pause after a failed `accept()` so a persistent error (e.g. EMFILE) does
/// not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

pub(crate) async fn bind_listener(host: &str, port: u16) -> Result<TcpListener, LifecycleError> {
    info!(
        target: "recache::master",
        host,
        port,
        "Binding listener"
    );

    match TcpListener::bind((host, port)).await {
        Ok(listener) => {
            info!(target: "recache::master", host, port, "Bind() successful");
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "recache::master",
                host,
                port,
                error = ?e,
                "Failed to bind listener"
            );
            Err(LifecycleError::Bind {
                addr: format!("{host}:{port}"),
                source: e,
            })
        }
    }
}

/// Accepts connections until `shutdown` fires, spawning one tracked task per
/// connection. The listener is dropped when this returns.
#[instrument(skip_all, fields(listen = ?listener.local_addr().ok()))]
pub(crate) async fn accept_loop(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
    connections: TaskTracker,
) {
    info!(target: "recache::master", "accept_loop started for listening socket");

    loop {
        let (stream, addr) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(
                        target: "recache::master",
                        error = ?e,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
        };

        debug!(
            target: "recache::master",
            client_addr = %addr,
            open_connections = connections.len(),
            "Connection accepted"
        );

        let span = info_span!("worker_connection", client_addr = %addr);
        let coordinator = coordinator.clone();
        let shutdown = shutdown.clone();

        connections.spawn(
            async move {
                if let Err(e) = handle_connection(stream, addr, coordinator, shutdown).await {
                    error!(
                        target: "recache::worker",
                        client_addr = %addr,
                        error = ?e,
                        "Error while handling connection"
                    );
                } else {
                    debug!(
                        target: "recache::worker",
                        client_addr = %addr,
                        "Connection handled successfully"
                    );
                }
            }
            .instrument(span),
        );
    }

    info!(target: "recache::master", "accept_loop stopped; listener closed");
}
