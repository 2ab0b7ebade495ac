//! Accept loop and per-connection request handling.
//!
//! # Responsibilities
//! - Accept connections within the admission limit and serve each on its own task
//! - Run the keep-alive loop: wait, parse, route, write
//! - Hand upgraded connections to the WebSocket engine
//! - Stop accepting on shutdown and wait for open connections to drain
//!
//! # Design Decisions
//! - A failing connection is logged and closed; the accept loop keeps going
//! - Connection tasks run inside `connection_scope`, so a panic in one is
//!   logged without stopping the server
//! - Idle timeouts close the connection without a response
//! - Limit violations are answered (400/413) and the connection closed

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::schema::LimitsConfig;
use crate::config::ServerConfig;
use crate::http::request::{ParseError, Request, RequestReader};
use crate::http::response::Response;
use crate::lifecycle::Shutdown;
use crate::net::{connection_scope, ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::Router;
use crate::websocket::WebSocketEngine;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug)]
struct ServerInner {
    router: Router,
    websocket: WebSocketEngine,
    limits: LimitsConfig,
    idle_timeout: Duration,
    drain_timeout: Duration,
    tracker: ConnectionTracker,
}

/// HTTP/1.1 server. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct HttpServer {
    inner: Arc<ServerInner>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, router: Router, websocket: WebSocketEngine) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                router,
                websocket,
                limits: config.limits.clone(),
                idle_timeout: Duration::from_secs(config.timeouts.idle_secs),
                drain_timeout: Duration::from_secs(config.shutdown.drain_timeout_secs),
                tracker: ConnectionTracker::new(),
            }),
        }
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Accept and serve connections until `shutdown` stops, then drain.
    pub async fn run(&self, listener: Listener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, max_connections = listener.max_connections(), "HTTP server starting");

        let mut stop_rx = shutdown.subscribe();
        while !shutdown.is_stopped() {
            let accepted = tokio::select! {
                res = listener.accept() => res,
                _ = stop_rx.recv() => break,
            };

            match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = self.inner.tracker.track();
                    let id = guard.id();
                    let server = self.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(connection_scope(id, async move {
                        let _permit = permit;
                        tracing::debug!(connection_id = %id, peer = %peer, "Connection opened");
                        if let Err(e) = server.serve_connection(stream, peer, id, shutdown).await {
                            tracing::warn!(connection_id = %id, peer = %peer, error = %e, "Connection failed");
                        }
                        drop(guard);
                    }));
                }
                Err(ListenerError::Closed) => return Err(ListenerError::Closed.into()),
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        drop(listener);
        let open = self.inner.tracker.active_count();
        tracing::info!(open_connections = open, "Listener closed, draining connections");
        if !self.inner.tracker.wait_for_drain(self.inner.drain_timeout).await {
            tracing::warn!(
                open_connections = self.inner.tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve one connection until the peer leaves, it idles out, or the
    /// server stops.
    async fn serve_connection(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        id: ConnectionId,
        shutdown: Shutdown,
    ) -> Result<(), ServerError> {
        let inner = &self.inner;
        let mut reader = RequestReader::new(&inner.limits, inner.idle_timeout);
        let mut stop_rx = shutdown.subscribe();

        loop {
            if !reader.has_buffered() {
                if shutdown.is_stopped() {
                    return Ok(());
                }
                let read = tokio::select! {
                    read = reader.fill(&mut stream) => read,
                    _ = stop_rx.recv() => return Ok(()),
                };
                match read {
                    Ok(0) => {
                        tracing::debug!(connection_id = %id, "Peer closed connection");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(ParseError::Timeout(after)) => {
                        tracing::info!(connection_id = %id, peer = %peer, idle_secs = after.as_secs(), "Idle timeout");
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            let started = Instant::now();
            let request = match reader.read_request(&mut stream).await {
                Ok(request) => request,
                Err(ParseError::Timeout(after)) => {
                    tracing::info!(connection_id = %id, peer = %peer, idle_secs = after.as_secs(), "Timed out mid-request");
                    return Ok(());
                }
                Err(e @ ParseError::HeadersTooLarge { .. }) => {
                    return reject(&mut stream, id, 400, "Bad Request", &e, started).await;
                }
                Err(e @ ParseError::BodyTooLarge { .. }) => {
                    return reject(&mut stream, id, 413, "Payload Too Large", &e, started).await;
                }
                Err(e) => return Err(e.into()),
            };

            if request.is_websocket_upgrade() {
                tracing::info!(connection_id = %id, path = request.path(), "WebSocket upgrade");
                metrics::record_request("websocket", 101, started);
                let buffered = reader.into_buffered();
                if let Err(e) = inner
                    .websocket
                    .serve(stream, &request, buffered, id, stop_rx)
                    .await
                {
                    tracing::warn!(connection_id = %id, error = %e, "WebSocket session failed");
                }
                return Ok(());
            }

            let response = inner.router.resolve(&request).await;
            let keep_alive = !request.wants_close() && !shutdown.is_stopped();
            stream.write_all(&response.to_bytes(keep_alive)).await?;

            metrics::record_request(request_kind(&request), response.status(), started);
            tracing::info!(
                connection_id = %id,
                method = request.method(),
                path = request.path(),
                status = response.status(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request served"
            );

            if !keep_alive {
                return Ok(());
            }
        }
    }
}

async fn reject(
    stream: &mut TcpStream,
    id: ConnectionId,
    status: u16,
    message: &str,
    cause: &ParseError,
    started: Instant,
) -> Result<(), ServerError> {
    tracing::warn!(connection_id = %id, status, error = %cause, "Rejecting request");
    let response = Response::json_error(status, message);
    stream.write_all(&response.to_bytes(false)).await?;
    metrics::record_request("rejected", status, started);
    Ok(())
}

fn request_kind(request: &Request) -> &'static str {
    if request.path().starts_with("/api/") {
        "api"
    } else {
        "static"
    }
}
