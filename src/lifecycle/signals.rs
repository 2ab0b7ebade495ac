//! OS signal and crash handling.
//!
//! # Responsibilities
//! - Ctrl+C schedules a delayed stop; a second Ctrl+C stops at once
//! - Panics are logged with location, message and stack trace
//! - A panic outside request dispatch and outside any connection task
//!   triggers a graceful stop
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handler panics are already answered with a 500 by dispatch and do not
//!   stop the server
//! - A panic in a connection task ends only that connection

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::Location;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::net::current_connection;
use crate::routing::handler::in_dispatch;

/// Listen for Ctrl+C until the server stops.
pub fn spawn_ctrl_c(shutdown: Shutdown, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut presses = 0u32;
        loop {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                        return;
                    }
                }
                _ = shutdown.stopped() => return,
            }

            presses += 1;
            if presses == 1 {
                tracing::warn!(delay_secs = delay.as_secs(), "Ctrl+C received, stopping");
                shutdown.stop_after(delay);
            } else {
                tracing::warn!("Second Ctrl+C, stopping now");
                shutdown.stop();
                return;
            }
        }
    })
}

/// Replace the panic hook with one that logs through `tracing`.
pub fn install_panic_hook(shutdown: Shutdown) {
    std::panic::set_hook(Box::new(move |info| {
        let PanicReport {
            location,
            message,
            backtrace,
        } = PanicReport::new(info.location(), info.payload());

        if in_dispatch() {
            tracing::error!(%location, %message, %backtrace, "Handler panicked");
        } else if let Some(id) = current_connection() {
            tracing::error!(connection_id = %id, %location, %message, %backtrace, "Connection task panicked");
        } else {
            tracing::error!(%location, %message, %backtrace, "Server crashed with unhandled panic");
            shutdown.stop();
        }
    }));
}

/// What the crash log records for one panic.
struct PanicReport<'a> {
    location: String,
    message: &'a str,
    backtrace: Backtrace,
}

impl<'a> PanicReport<'a> {
    fn new(location: Option<&Location<'_>>, payload: &'a (dyn Any + Send)) -> Self {
        Self {
            location: location
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown".to_string()),
            message: panic_message(payload),
            backtrace: Backtrace::force_capture(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::backtrace::BacktraceStatus;

    #[test]
    fn panic_payloads_render() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*boxed), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*boxed), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*boxed), "non-string panic payload");
    }

    #[test]
    fn report_carries_location_and_stack_trace() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let here = Location::caller();

        let report = PanicReport::new(Some(here), &*payload);
        assert_eq!(
            report.location,
            format!("{}:{}:{}", here.file(), here.line(), here.column())
        );
        assert_eq!(report.message, "boom");
        assert_ne!(report.backtrace.status(), BacktraceStatus::Disabled);

        assert_eq!(PanicReport::new(None, &*payload).location, "unknown");
    }
}
