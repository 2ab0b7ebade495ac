//! Request resolution.
//!
//! # Responsibilities
//! - Send `/api/` paths to the exact-match handler table
//! - Gate protected static pages behind a valid session cookie
//! - Serve everything else from the static resolver
//!
//! # Design Decisions
//! - Immutable after construction; shared across connection tasks via `Arc`
//! - The verb is ignored: `GET /api/x` and `POST /api/x` reach the same handler
//! - Traversal sequences are stripped before the protected-path check so
//!   `/../home` cannot skip the session gate

use crate::auth::cookie::get_cookie;
use crate::auth::SessionStore;
use crate::config::ServerConfig;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::handler::{dispatch, HandlerRegistry};
use crate::routing::matcher::{AnyMatcher, ExactPathMatcher, Matcher};
use crate::routing::statics::{strip_traversal, StaticResolver};

const API_PREFIX: &str = "/api/";

/// Decides how each request is answered.
#[derive(Debug)]
pub struct Router {
    handlers: HandlerRegistry,
    sessions: SessionStore,
    statics: StaticResolver,
    protected: AnyMatcher,
    login: ExactPathMatcher,
    login_path: String,
    landing_path: String,
    cookie_name: String,
}

impl Router {
    pub fn new(config: &ServerConfig, sessions: SessionStore, handlers: HandlerRegistry) -> Self {
        let auth = &config.auth;
        Self {
            handlers,
            sessions,
            statics: StaticResolver::from_config(&config.static_files),
            protected: AnyMatcher::prefixes(&auth.protected_prefixes),
            login: ExactPathMatcher::new(auth.login_path.as_str()),
            login_path: auth.login_path.clone(),
            landing_path: auth.landing_path.clone(),
            cookie_name: auth.cookie_name.clone(),
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Produce the response for one request.
    pub async fn resolve(&self, request: &Request) -> Response {
        let path = request.path();

        if path.starts_with(API_PREFIX) {
            return match self.handlers.get(path) {
                Some(factory) => {
                    dispatch(path, factory, &request.body_text(), request.headers()).await
                }
                None => {
                    tracing::debug!(path, method = request.method(), "No API route");
                    Response::json_error(404, "Endpoint Not found")
                }
            };
        }

        let path = strip_traversal(path);
        let signed_in = || {
            get_cookie(request.headers(), &self.cookie_name)
                .and_then(|token| self.sessions.validate_token(token))
                .is_some()
        };

        if self.protected.matches(&path) && !signed_in() {
            tracing::debug!(path = %path, "Protected page without session");
            return Response::redirect(&self.login_path);
        }
        if self.login.matches(&path) && signed_in() {
            return Response::redirect(&self.landing_path);
        }

        self.statics.serve(&path).await
    }
}
