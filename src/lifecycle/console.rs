//! Operator console on stdin.
//!
//! `stop` schedules a stop after the configured default delay; `stop N` and
//! `stop(N)` use N seconds. An unreadable N falls back to the default.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Stop after the given seconds, or the default delay.
    Stop(Option<u64>),
}

/// Parse one console line.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    let rest = line.strip_prefix("stop")?;
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('(')) {
        return None;
    }
    let arg = rest.trim_matches(|c: char| c == ' ' || c == '(' || c == ')');
    Some(ConsoleCommand::Stop(arg.parse().ok()))
}

/// Read commands from stdin until EOF or shutdown.
pub fn spawn_console(shutdown: Shutdown, default_delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = shutdown.stopped() => return,
            };
            match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(ConsoleCommand::Stop(secs)) => {
                        let delay = secs.map(Duration::from_secs).unwrap_or(default_delay);
                        shutdown.stop_after(delay);
                    }
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(command = %line.trim(), "Unknown console command"),
                },
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!(error = %e, "Console input closed");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_forms() {
        assert_eq!(parse_command("stop"), Some(ConsoleCommand::Stop(None)));
        assert_eq!(parse_command("  stop 5 "), Some(ConsoleCommand::Stop(Some(5))));
        assert_eq!(parse_command("stop(5)"), Some(ConsoleCommand::Stop(Some(5))));
        assert_eq!(parse_command("stop ( 12 )"), Some(ConsoleCommand::Stop(Some(12))));
        assert_eq!(parse_command("stop soon"), Some(ConsoleCommand::Stop(None)));
    }

    #[test]
    fn other_input_is_ignored() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("stopped"), None);
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("STOP"), None);
    }
}
