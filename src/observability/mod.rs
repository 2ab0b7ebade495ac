//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured events → stdout + log file)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (connection_id, path, status)
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;
