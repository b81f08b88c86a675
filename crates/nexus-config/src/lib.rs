//! Shared configuration for the Nexus orchestrator, its workers and the client.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `NEXUS_*` environment variables, then command-line
//! flags. The orchestrator loads it once and passes the resulting [`Config`]
//! by reference to every component it constructs; forked workers inherit the
//! same value.

mod defaults;
mod logging;
mod mode;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    AUTH_TOKEN_FILE, DEFAULT_LOG_FILTER, DEFAULT_MAX_CONNECTIONS, DEFAULT_SEND_TIMEOUT_SECS,
    DEFAULT_SERVICE_TIMEOUT_SECS, DEFAULT_SERVICES, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
    DEFAULT_SOCKET_DIR, DEFAULT_SOCKET_PERMISSIONS, default_auth_token_path, default_log_filter,
    default_log_filter_string, default_log_format, default_services, default_socket_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use mode::{SocketMode, SocketModeError};
pub use socket::{ServiceSocketLayout, SocketLayoutError};

/// Runtime configuration shared by every Nexus process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "NEXUS")]
pub struct Config {
    /// Directory holding one `service_<name>.sock` per worker.
    #[ortho_config(default = defaults::default_socket_dir())]
    pub socket_dir: Utf8PathBuf,
    /// Permission bits applied to each socket file, written as octal digits
    /// (`770` or `"0770"`).
    #[ortho_config(default = SocketMode::default())]
    pub socket_permissions: SocketMode,
    /// Per-message receive timeout, in seconds.
    #[ortho_config(default = defaults::DEFAULT_SERVICE_TIMEOUT_SECS)]
    pub service_timeout_secs: u64,
    /// Send timeout for accepted connections, in seconds.
    #[ortho_config(default = defaults::DEFAULT_SEND_TIMEOUT_SECS)]
    pub send_timeout_secs: u64,
    /// Grace period between SIGTERM and SIGKILL during shutdown, in seconds.
    #[ortho_config(default = defaults::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout_secs: u64,
    /// Listen backlog for each service socket.
    #[ortho_config(default = defaults::DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    /// File holding the shared authentication token.
    #[ortho_config(default = defaults::default_auth_token_path())]
    pub auth_token_path: Utf8PathBuf,
    /// Rejects requests whose `auth_token` does not match the shared token.
    #[ortho_config(default = false)]
    pub require_auth: bool,
    /// Optional JSON route manifest; the built-in table is used when absent.
    pub routes_path: Option<Utf8PathBuf>,
    /// Comma-separated service names launched by the orchestrator.
    #[ortho_config(default = defaults::default_services())]
    pub services: String,
    /// Log filter expression understood by `tracing-subscriber`.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log events.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            socket_permissions: SocketMode::default(),
            service_timeout_secs: DEFAULT_SERVICE_TIMEOUT_SECS,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auth_token_path: default_auth_token_path(),
            require_auth: false,
            routes_path: None,
            services: default_services(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Directory holding the service sockets.
    #[must_use]
    pub fn socket_dir(&self) -> &Utf8Path {
        &self.socket_dir
    }

    /// Socket layout derived from this configuration.
    #[must_use]
    pub fn socket_layout(&self) -> ServiceSocketLayout {
        ServiceSocketLayout::from_config(self)
    }

    /// Per-message receive timeout.
    #[must_use]
    pub const fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    /// Send timeout for accepted connections.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Grace period granted to workers during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Path of the shared token file.
    #[must_use]
    pub fn auth_token_path(&self) -> &Utf8Path {
        &self.auth_token_path
    }

    /// Optional route manifest path.
    #[must_use]
    pub fn routes_path(&self) -> Option<&Utf8Path> {
        self.routes_path.as_deref()
    }

    /// Service names listed in [`Config::services`], trimmed and de-duplicated
    /// while preserving their order.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.services.split(',').map(str::trim) {
            if !name.is_empty() && !names.iter().any(|existing| existing == name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
