//! Arsenal inventory server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──TCP──▶ net::Listener ──▶ http::server (keep-alive loop)
//!                                          │
//!                     ┌────────────────────┼─────────────────────┐
//!                     ▼                    ▼                     ▼
//!              http::request        Upgrade: websocket     routing::Router
//!              (parse, limits)      websocket::engine      ├─ /api/* → api handlers
//!                                   (chat broadcast)       └─ static pages / data
//!
//!     Cross-cutting: config, auth::SessionStore, lifecycle (shutdown,
//!     Ctrl+C, console, panic hook), observability (logs, metrics)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use arsenal_server::auth::InMemoryUserDirectory;
use arsenal_server::config::validation::validate_config;
use arsenal_server::config::{load_config, ConfigError, ServerConfig};
use arsenal_server::lifecycle::{console, signals, startup, Shutdown};
use arsenal_server::observability::logging;

#[derive(Parser)]
#[command(name = "arsenal-server")]
#[command(about = "Weapons inventory server", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address (e.g. 127.0.0.1:9999)
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the static pages root
    #[arg(long)]
    pages: Option<String>,

    /// Override the data root
    #[arg(long)]
    data: Option<String>,

    /// Override the log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(pages) = self.pages {
            config.static_files.pages_root = pages;
        }
        if let Some(data) = self.data {
            config.static_files.data_root = data;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.observability)?;

    tracing::info!("===== SESSION START =====");
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        idle_secs = config.timeouts.idle_secs,
        pages_root = %config.static_files.pages_root,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let delay = Duration::from_secs(config.shutdown.default_delay_secs);
    signals::install_panic_hook(shutdown.clone());
    signals::spawn_ctrl_c(shutdown.clone(), delay);
    console::spawn_console(shutdown.clone(), delay);
    tracing::info!(
        default_delay_secs = delay.as_secs(),
        "Type 'stop' or 'stop N' to stop the server"
    );

    let users = Arc::new(InMemoryUserDirectory::from_config(&config.users));
    if users.is_empty() {
        tracing::warn!("No user accounts configured; logins will fail");
    }

    startup::start(&config, users, shutdown).await?;

    tracing::info!("===== SESSION END =====");
    Ok(())
}
