//! Handler contract, route table and the dispatch wrapper.
//!
//! # Responsibilities
//! - Define what an API handler is: `(body, headers) -> Response`
//! - Map exact paths to handler factories (one fresh handler per request)
//! - Convert handler errors into the standard JSON error responses
//!
//! # Design Decisions
//! - Routing is by path only; the HTTP verb is never consulted and the path
//!   itself encodes intent (`/api/weapons/add`, `/api/weapons/delete`)
//! - Handlers return typed errors instead of rendering their own 500s
//! - A panicking handler becomes a 500 for that request only; the panic hook
//!   can see it happened inside dispatch via [`in_dispatch`]

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;

use crate::auth::users::DirectoryError;
use crate::http::request::Headers;
use crate::http::response::Response;

/// An API endpoint.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, body: &str, headers: &Headers) -> Result<Response, HandlerError>;
}

/// Builds a fresh handler for each request.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

/// Failures a handler may report; each maps to one JSON error response.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> u16 {
        match self {
            HandlerError::BadRequest(_) => 400,
            HandlerError::Unauthorized => 401,
            HandlerError::Forbidden => 403,
            HandlerError::NotFound(_) => 404,
            HandlerError::Internal(_) => 500,
        }
    }

    /// Render as `{"error": ...}`. Internal details never reach the client.
    pub fn to_response(&self) -> Response {
        match self {
            HandlerError::Internal(_) => Response::json_error(500, "Server error"),
            other => Response::json_error(other.status(), &other.to_string()),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(_: serde_json::Error) -> Self {
        HandlerError::BadRequest("Invalid payload".to_string())
    }
}

impl From<DirectoryError> for HandlerError {
    fn from(e: DirectoryError) -> Self {
        HandlerError::Internal(e.to_string())
    }
}

/// Exact path → handler factory table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    routes: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for the exact `path`, replacing any previous entry.
    pub fn register<F, H>(&mut self, path: &str, factory: F) -> &mut Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: Handler + 'static,
    {
        let factory: HandlerFactory = Arc::new(move || Box::new(factory()) as Box<dyn Handler>);
        self.routes.insert(path.to_string(), factory);
        self
    }

    pub fn get(&self, path: &str) -> Option<&HandlerFactory> {
        self.routes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<_> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("routes", &self.paths())
            .finish()
    }
}

tokio::task_local! {
    static DISPATCH_SCOPE: ();
}

/// True while a handler is being polled by [`dispatch`] on this thread.
pub fn in_dispatch() -> bool {
    DISPATCH_SCOPE.try_with(|_| ()).is_ok()
}

/// Construct the handler, run it and turn any error into a response.
pub async fn dispatch(path: &str, factory: &HandlerFactory, body: &str, headers: &Headers) -> Response {
    let outcome = DISPATCH_SCOPE
        .scope((), async {
            AssertUnwindSafe(async {
                let handler = factory();
                handler.handle(body, headers).await
            })
            .catch_unwind()
            .await
        })
        .await;

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(HandlerError::Internal(detail))) => {
            tracing::error!(path, error = %detail, "Handler failed");
            HandlerError::Internal(detail).to_response()
        }
        Ok(Err(e)) => {
            tracing::debug!(path, status = e.status(), error = %e, "Handler rejected request");
            e.to_response()
        }
        Err(_) => {
            tracing::error!(path, "Handler panicked");
            HandlerError::Internal("panic".to_string()).to_response()
        }
    }
}
