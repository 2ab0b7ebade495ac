//! Operational endpoints.

use async_trait::async_trait;
use serde::Serialize;

use crate::auth::SessionStore;
use crate::http::request::Headers;
use crate::http::response::Response;
use crate::routing::{Handler, HandlerError};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

/// `GET /api/status`
pub struct StatusHandler;

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(&self, _body: &str, _headers: &Headers) -> Result<Response, HandlerError> {
        Ok(Response::json(
            200,
            &SystemStatus {
                version: env!("CARGO_PKG_VERSION"),
                status: "operational",
            },
        ))
    }
}

#[derive(Serialize)]
pub struct SessionSummary {
    pub total_tracked: usize,
}

/// `GET /api/admin/sessions`: size of the session table. Admin bearer only.
pub struct SessionsHandler {
    pub sessions: SessionStore,
}

#[async_trait]
impl Handler for SessionsHandler {
    async fn handle(&self, _body: &str, headers: &Headers) -> Result<Response, HandlerError> {
        if self.sessions.validate(headers.get("authorization")).is_none() {
            return Err(HandlerError::Unauthorized);
        }
        if !self.sessions.require_role(headers, &["Admin"]) {
            return Err(HandlerError::Forbidden);
        }
        Ok(Response::json(
            200,
            &SessionSummary {
                total_tracked: self.sessions.len(),
            },
        ))
    }
}
