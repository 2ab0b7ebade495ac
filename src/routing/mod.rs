//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (path, headers, body)
//!     → router.rs
//!         /api/<exact>   → handler.rs (registry lookup, dispatch wrapper)
//!         protected page → matcher.rs + session cookie check → 302 /login
//!         anything else  → statics.rs (pages/data roots, default page)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Handler table built at startup, immutable at runtime
//! - No regex in the hot path (exact and prefix matching only)
//! - Deterministic: same input always resolves the same way

pub mod handler;
pub mod matcher;
pub mod router;
pub mod statics;

pub use handler::{dispatch, Handler, HandlerError, HandlerFactory, HandlerRegistry};
pub use router::Router;
pub use statics::StaticResolver;
