use std::sync::Arc;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::handler::ReportHandler;
use crate::config::Config;
use crate::error::{GateError, Result};

/// Bind `config.listen` and serve the report endpoint until `shutdown` is cancelled.
pub async fn run(config: &Config, handler: ReportHandler, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await.map_err(GateError::Io)?;
    serve(listener, handler, config.timeout.shutdown(), shutdown).await
}

/// Serve connections from `listener` until `shutdown` is cancelled.
///
/// On shutdown, stops accepting, asks every open connection to finish its
/// in-flight request and waits up to `shutdown_timeout` for them.
pub async fn serve(
    listener: TcpListener,
    handler: ReportHandler,
    shutdown_timeout: std::time::Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let builder = ConnBuilder::new(TokioExecutor::new());
    let connections = TaskTracker::new();

    info!(?addr, "listening for reports");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested, no longer accepting connections");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                let builder = builder.clone();
                let handler = handler.clone();
                let shutdown = shutdown.clone();

                connections.spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        async move { Ok::<_, hyper::Error>(handler.call(req).await) }
                    });

                    let conn = builder.serve_connection(TokioIo::new(stream), svc);
                    tokio::pin!(conn);

                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        _ = shutdown.cancelled() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                    };
                    if let Err(e) = result {
                        warn!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    connections.close();
    info!(
        active_connections = connections.len(),
        "Waiting for active connections to finish (timeout: {}s)",
        shutdown_timeout.as_secs()
    );

    if tokio::time::timeout(shutdown_timeout, connections.wait()).await.is_err() {
        warn!(
            active_connections = connections.len(),
            "Shutdown timeout reached, connections still active"
        );
    } else {
        info!("All connections closed");
    }

    info!("report server stopped");
    Ok(())
}
