use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;

/// Default directory holding per-service sockets.
pub const DEFAULT_SOCKET_DIR: &str = "/tmp/service";

/// Default permission bits applied to each service socket file.
pub const DEFAULT_SOCKET_PERMISSIONS: u32 = 0o770;

/// Default per-message receive timeout, in seconds.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;

/// Default send timeout applied to accepted connections, in seconds.
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;

/// Default grace period granted to a worker before it is killed, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Default listen backlog for service sockets.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 50;

/// Default comma-separated list of services launched by the orchestrator.
pub const DEFAULT_SERVICES: &str = "home";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name of the persisted shared secret.
pub const AUTH_TOKEN_FILE: &str = ".auth_token";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default directory holding per-service sockets.
#[must_use]
pub fn default_socket_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SOCKET_DIR)
}

/// Owned default service list.
#[must_use]
pub fn default_services() -> String {
    DEFAULT_SERVICES.to_owned()
}

/// Computes the default location of the shared authentication token.
///
/// The token lives in the user's runtime directory when one is available and
/// falls back to a per-user namespace under the system temporary directory.
#[must_use]
pub fn default_auth_token_path() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("nexus");
    if apply_namespace {
        base.push(user_namespace());
    }
    base.join(AUTH_TOKEN_FILE)
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_namespace() -> String {
    "shared".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_path_ends_with_token_file() {
        let path = default_auth_token_path();
        assert_eq!(path.file_name(), Some(AUTH_TOKEN_FILE));
        assert!(
            path.components().any(|component| component.as_str() == "nexus"),
            "token path should be namespaced: {path}"
        );
    }
}
