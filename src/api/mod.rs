//! Built-in API endpoints.
//!
//! # Responsibilities
//! - Authentication: login, logout, current user
//! - Operational status
//!
//! Inventory endpoints (weapons, storages, inventory) are registered by the
//! embedding application against its own data layer.

pub mod auth;
pub mod status;

use std::sync::Arc;

use crate::auth::{SessionStore, UserDirectory};
use crate::config::AuthConfig;
use crate::routing::HandlerRegistry;

pub use auth::{LoginHandler, LogoutHandler, MeHandler};
pub use status::{SessionsHandler, StatusHandler};

/// Route table with every built-in endpoint.
pub fn default_routes(
    auth: &AuthConfig,
    users: Arc<dyn UserDirectory>,
    sessions: SessionStore,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    let (u, s, c) = (users.clone(), sessions.clone(), auth.cookie_name.clone());
    registry.register("/api/auth/login", move || LoginHandler {
        users: u.clone(),
        sessions: s.clone(),
        cookie_name: c.clone(),
    });

    let (s, c) = (sessions.clone(), auth.cookie_name.clone());
    registry.register("/api/auth/logout", move || LogoutHandler {
        sessions: s.clone(),
        cookie_name: c.clone(),
    });

    let (u, s, c) = (users, sessions.clone(), auth.cookie_name.clone());
    registry.register("/api/auth/me", move || MeHandler {
        users: u.clone(),
        sessions: s.clone(),
        cookie_name: c.clone(),
    });

    registry.register("/api/status", || StatusHandler);
    registry.register("/api/admin/sessions", move || SessionsHandler {
        sessions: sessions.clone(),
    });

    registry
}
