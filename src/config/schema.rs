//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the inventory server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, admission).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Session and cookie settings.
    pub auth: AuthConfig,

    /// Static page and data roots.
    pub static_files: StaticConfig,

    /// WebSocket chat settings.
    pub websocket: WebSocketConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Development user accounts for the in-memory directory.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9999").
    pub bind_address: String,

    /// Maximum concurrently served connections (admission control).
    /// A value of 1 serves connections strictly one at a time.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
            max_connections: 256,
        }
    }
}

/// Timeout configuration for connection handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle keep-alive timeout; bounds every socket read, in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { idle_secs: 30 }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of the request line plus headers.
    pub max_header_bytes: usize,

    /// Maximum declared `Content-Length`.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Session and cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in hours.
    pub session_ttl_hours: u64,

    /// Name of the cookie carrying the session token.
    pub cookie_name: String,

    /// Page unauthenticated visitors are redirected to.
    pub login_path: String,

    /// Page authenticated visitors land on when they open the login page.
    pub landing_path: String,

    /// Static path prefixes that require a valid session.
    pub protected_prefixes: Vec<String>,

    /// Interval for purging expired sessions. Disabled when unset.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 12,
            cookie_name: "authToken".to_string(),
            login_path: "/login".to_string(),
            landing_path: "/home".to_string(),
            protected_prefixes: vec![
                "/home".to_string(),
                "/admin".to_string(),
                "/detail".to_string(),
                "/profile".to_string(),
            ],
            sweep_interval_secs: None,
        }
    }
}

/// Static content roots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Directory holding `<name>/<name>.html` page folders.
    pub pages_root: String,

    /// Directory served under the `/data/` prefix.
    pub data_root: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            pages_root: "pages".to_string(),
            data_root: "data".to_string(),
        }
    }
}

/// WebSocket chat configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Largest accepted frame payload.
    pub max_payload_bytes: u64,

    /// Whether a broadcast is also delivered back to its sender.
    pub echo_to_sender: bool,

    /// Frames that may wait for one peer before it is dropped as stalled.
    pub outbound_queue_frames: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 16 * 1024 * 1024,
            echo_to_sender: true,
            outbound_queue_frames: 1024,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Delay applied to a bare `stop` command and to Ctrl+C, in seconds.
    pub default_delay_secs: u64,

    /// How long to wait for open connections after the listener closes.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            default_delay_secs: 10,
            drain_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Append-only log file. Stdout only when unset.
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: Some("data/server.log".to_string()),
        }
    }
}

/// A development account served by the in-memory user directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub id: i64,
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
    /// Display name; the username when unset.
    #[serde(default)]
    pub fullname: Option<String>,
    /// Admin flag; derived from the role when unset.
    #[serde(default)]
    pub is_admin: Option<bool>,
    /// Clearance level; `Low` when unset.
    #[serde(default)]
    pub clearance: Option<String>,
}

fn default_role() -> String {
    "User".to_string()
}
