//! Error types for the worker transport.

use std::io;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use nexus_config::SocketLayoutError;

use crate::routing::DispatchHalt;

/// Errors raised while creating a worker's listening socket.
///
/// These are fatal for the worker being constructed only.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The socket path could not be derived or its directory created.
    #[error("failed to prepare socket location: {0}")]
    Layout(#[from] SocketLayoutError),
    /// A non-socket file occupies the socket path.
    #[error("'{path}' exists and is not a socket")]
    NotASocket {
        /// Occupied path.
        path: Utf8PathBuf,
    },
    /// A stale socket file could not be removed.
    #[error("failed to remove stale socket '{path}': {source}")]
    RemoveStale {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Creating, binding or listening on the socket failed.
    #[error("failed to {operation} socket '{path}': {source}")]
    Socket {
        /// Failed step: `create`, `bind`, `listen` or `configure`.
        operation: &'static str,
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The socket file could not be removed when the worker stopped.
    #[error("failed to remove socket '{path}': {source}")]
    Cleanup {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Applying the configured permissions failed.
    #[error("failed to set permissions {mode:o} on '{path}': {source}")]
    Permissions {
        /// Socket path.
        path: Utf8PathBuf,
        /// Requested mode.
        mode: u32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ListenerError {
    pub(crate) fn socket(
        operation: &'static str,
        path: impl Into<Utf8PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Socket {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Per-connection failures. None of these stop the accept loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading from or writing to the connection failed.
    #[error("connection IO failed: {0}")]
    Io(#[from] io::Error),
    /// No complete message arrived within the receive timeout.
    #[error("no message received within {}ms", .timeout.as_millis())]
    Timeout {
        /// Configured receive timeout.
        timeout: Duration,
    },
    /// The peer closed the connection before sending anything.
    #[error("peer closed the connection without sending a message")]
    EmptyMessage,
    /// The payload is not a JSON object matching the request model.
    #[error("malformed message: {reason}")]
    MalformedMessage {
        /// Description of the defect.
        reason: String,
        /// Underlying parse error, when there is one.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// Authentication is required and the request token did not match.
    #[error("request token rejected")]
    Unauthenticated,
    /// The response body could not be serialised.
    #[error("failed to serialise response: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The router halted the request.
    #[error(transparent)]
    Dispatch(#[from] DispatchHalt),
}

impl TransportError {
    pub(crate) fn malformed(reason: impl Into<String>, source: Option<serde_json::Error>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
            source,
        }
    }
}
