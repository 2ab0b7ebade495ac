//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (keep-alive loop, upgrade detection)
//!     → request.rs (bytes → Request, size limits, idle timeout)
//!     → routing layer (API handler or static file)
//!     → response.rs (Response → bytes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{Headers, ParseError, Request, RequestReader};
pub use response::Response;
pub use server::{HttpServer, ServerError};
