//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → SessionStore + routes + Router + WebSocketEngine → bind → serve
//!
//! Shutdown (shutdown.rs):
//!     stop / stop_after(delay) → stop accepting → drain connections → exit
//!
//! Triggers:
//!     signals.rs  Ctrl+C → stop_after(default delay); stray panic → log, stop
//!     console.rs  "stop", "stop N", "stop(N)" → stop_after
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: the drain gives up after a deadline

pub mod console;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
