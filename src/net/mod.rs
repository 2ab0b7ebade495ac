//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (connection slot, then accept)
//!     → connection.rs (id, live-connection tracking)
//!     → Hand off to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded admission prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{
    connection_scope, current_connection, ConnectionGuard, ConnectionId, ConnectionTracker,
};
pub use listener::{ConnectionPermit, Listener, ListenerError};
