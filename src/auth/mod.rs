//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/auth/login
//!     → users.rs (UserDirectory verifies credentials)
//!     → session.rs (issue token)
//!     → cookie.rs (Set-Cookie with the token)
//!
//! Later requests:
//!     Authorization: Bearer <token>  ─┐
//!     Cookie: authToken=<token>      ─┴→ session.rs (validate / require_role)
//! ```
//!
//! # Design Decisions
//! - One store instance, injected via clone, no global state
//! - Tokens are opaque; nothing is encoded in them
//! - Revocation is idempotent

pub mod cookie;
pub mod session;
pub mod users;

pub use session::{Session, SessionStore};
pub use users::{InMemoryUserDirectory, User, UserDirectory};
