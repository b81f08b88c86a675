//! Shared fixtures for the behavioural suites.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use once_cell::sync::Lazy;
use tempfile::TempDir;

use nexus_config::Config;

use crate::bootstrap::build_router;
use crate::context::ServiceContext;
use crate::routing::Router;
use crate::security::TokenGuard;

pub(super) const TEST_TOKEN: &str = "behaviour-test-token";

// Forking while another test thread forks can hand the child a half-updated
// process state, so forking suites take this lock.
static FORK_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub(super) fn fork_lock() -> MutexGuard<'static, ()> {
    FORK_MUTEX.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Temporary socket directory with a matching service context.
pub(super) struct Sandbox {
    _dir: TempDir,
    pub(super) context: ServiceContext,
}

impl Sandbox {
    pub(super) fn new(require_auth: bool) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path");
        let config = Config {
            socket_dir: root.join("sockets"),
            auth_token_path: root.join(".auth_token"),
            service_timeout_secs: 2,
            shutdown_timeout_secs: 2,
            require_auth,
            ..Config::default()
        };
        let context = ServiceContext::new(
            Arc::new(config),
            Arc::new(TokenGuard::from_token(TEST_TOKEN)),
        );
        Self { _dir: dir, context }
    }

    pub(super) fn socket_path(&self, service: &str) -> Utf8PathBuf {
        self.context
            .config()
            .socket_layout()
            .socket_path(service)
            .expect("socket path")
    }
}

pub(super) fn builtin_router(context: &ServiceContext) -> Router {
    build_router(context.config()).expect("built-in routes compile")
}

/// Polls `condition` until it holds or five seconds pass.
pub(super) fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}
