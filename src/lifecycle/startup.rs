//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the session store, route table, router and WebSocket engine
//! - Start optional background tasks (session sweeper)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: a bind error is fatal
//! - The listener starts last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use crate::api::default_routes;
use crate::auth::{SessionStore, UserDirectory};
use crate::config::ServerConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::Shutdown;
use crate::net::Listener;
use crate::routing::Router;
use crate::websocket::{BroadcastRegistry, WebSocketEngine};

/// Everything a running server shares between connections.
#[derive(Debug, Clone)]
pub struct Services {
    pub sessions: SessionStore,
    pub chat: BroadcastRegistry,
    pub server: HttpServer,
}

/// Wire the subsystems together from configuration.
pub fn assemble(config: &ServerConfig, users: Arc<dyn UserDirectory>) -> Services {
    let ttl = Duration::from_secs(config.auth.session_ttl_hours.saturating_mul(60 * 60));
    let sessions = SessionStore::new(ttl);
    let routes = default_routes(&config.auth, users, sessions.clone());
    tracing::debug!(routes = ?routes.paths(), "API routes registered");

    let router = Router::new(config, sessions.clone(), routes);
    let chat = BroadcastRegistry::with_capacity(config.websocket.outbound_queue_frames);
    let websocket = WebSocketEngine::new(&config.websocket, chat.clone());

    Services {
        sessions,
        chat,
        server: HttpServer::new(config, router, websocket),
    }
}

/// Bind, start background tasks and serve until `shutdown` stops.
pub async fn start(
    config: &ServerConfig,
    users: Arc<dyn UserDirectory>,
    shutdown: Shutdown,
) -> Result<(), ServerError> {
    let services = assemble(config, users);

    if let Some(secs) = config.auth.sweep_interval_secs {
        services
            .sessions
            .spawn_sweeper(Duration::from_secs(secs), shutdown.subscribe());
    }

    let listener = Listener::bind(&config.listener).await?;
    services.server.run(listener, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryUserDirectory;

    #[test]
    fn assembles_with_builtin_routes() {
        let services = assemble(
            &ServerConfig::default(),
            Arc::new(InMemoryUserDirectory::new()),
        );
        assert!(services.server.router().handlers().contains("/api/auth/login"));
        assert!(services.sessions.is_empty());
        assert!(services.chat.is_empty());
    }
}
