//! Login, logout and current-user endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::cookie::{clear_cookie, get_cookie, session_cookie};
use crate::auth::{SessionStore, UserDirectory};
use crate::http::request::Headers;
use crate::http::response::Response;
use crate::routing::{Handler, HandlerError};

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(alias = "Username")]
    username: String,
    #[serde(alias = "Password")]
    password: String,
}

/// `POST /api/auth/login`: verify credentials, issue a session and set the
/// session cookie.
pub struct LoginHandler {
    pub users: Arc<dyn UserDirectory>,
    pub sessions: SessionStore,
    pub cookie_name: String,
}

#[async_trait]
impl Handler for LoginHandler {
    async fn handle(&self, body: &str, _headers: &Headers) -> Result<Response, HandlerError> {
        let req: LoginRequest = serde_json::from_str(body)?;
        if req.username.trim().is_empty() || req.password.trim().is_empty() {
            return Err(HandlerError::BadRequest("Invalid payload".to_string()));
        }

        let Some(user) = self.users.verify_password(&req.username, &req.password).await? else {
            tracing::info!(username = %req.username, "Login rejected");
            return Ok(Response::json_error(401, "Invalid username or password"));
        };

        let token = self.sessions.issue(user.id, &user.username, &user.role);
        tracing::info!(user_id = user.id, username = %user.username, "User logged in");

        Ok(
            Response::json(200, &serde_json::json!({ "token": token, "user": user }))
                .with_header("Set-Cookie", session_cookie(&self.cookie_name, &token)),
        )
    }
}

/// `POST /api/auth/logout`: revoke the caller's token and clear the cookie.
pub struct LogoutHandler {
    pub sessions: SessionStore,
    pub cookie_name: String,
}

#[async_trait]
impl Handler for LogoutHandler {
    async fn handle(&self, _body: &str, headers: &Headers) -> Result<Response, HandlerError> {
        if let Some(session) = self.sessions.validate_request(headers, &self.cookie_name) {
            tracing::info!(user_id = session.user_id, username = %session.username, "User logged out");
        }
        self.sessions.revoke(headers.get("authorization"));
        if let Some(token) = get_cookie(headers, &self.cookie_name) {
            self.sessions.revoke_token(token);
        }

        Ok(
            Response::json(200, &serde_json::json!({ "ok": true, "message": "Logged out" }))
                .with_header("Set-Cookie", clear_cookie(&self.cookie_name)),
        )
    }
}

/// `GET /api/auth/me`: profile of the signed-in user.
pub struct MeHandler {
    pub users: Arc<dyn UserDirectory>,
    pub sessions: SessionStore,
    pub cookie_name: String,
}

#[async_trait]
impl Handler for MeHandler {
    async fn handle(&self, _body: &str, headers: &Headers) -> Result<Response, HandlerError> {
        let session = self
            .sessions
            .validate_request(headers, &self.cookie_name)
            .ok_or(HandlerError::Unauthorized)?;

        let user = self
            .users
            .find_by_username(&session.username)
            .await?
            .ok_or_else(|| HandlerError::NotFound("User not found".to_string()))?;

        Ok(Response::json(200, &user))
    }
}
