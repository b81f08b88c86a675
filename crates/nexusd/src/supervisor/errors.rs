//! Errors raised by the process supervisor.

use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Failures surfaced to the code driving the supervisor.
///
/// Child crashes are not errors; they are observed and recovered inside the
/// monitoring loop.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The service class is not in the catalogue.
    #[error("unknown service class '{class}'")]
    UnknownService {
        /// Requested class.
        class: String,
    },
    /// A service with this name is already registered.
    #[error("service '{name}' is already registered")]
    DuplicateService {
        /// Service name.
        name: String,
    },
    /// Forking the worker process failed.
    #[error("failed to fork worker for service '{name}': {source}")]
    Fork {
        /// Service name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Polling a child for exit failed.
    #[error("failed to wait for service '{name}': {source}")]
    Wait {
        /// Service name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Delivering a signal to a child failed.
    #[error("failed to signal service '{name}': {source}")]
    Signal {
        /// Service name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Blocking control signals around a fork failed.
    #[error("failed to block signals before forking service '{name}': {source}")]
    SignalMask {
        /// Service name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Installing the orchestrator's signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
