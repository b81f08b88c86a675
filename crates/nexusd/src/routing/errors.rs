//! Error types for route table construction and request dispatch.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use super::validation::ValidationErrors;

/// Errors raised while loading a manifest or compiling a route table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    /// The manifest file could not be read.
    #[error("failed to read route manifest '{path}': {source}")]
    ReadManifest {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The manifest is not valid JSON or does not match the declaration model.
    #[error("invalid route manifest ({origin}): {source}")]
    Manifest {
        /// File path or description of the manifest source.
        origin: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// No controller is registered under the declared key.
    #[error("route {method} {path}: unknown controller '{controller}'")]
    UnknownController {
        /// Declared method.
        method: String,
        /// Full route path.
        path: String,
        /// Controller key.
        controller: String,
    },
    /// The controller does not expose the declared action.
    #[error("route {method} {path}: controller '{controller}' has no action '{action}'")]
    UnknownAction {
        /// Declared method.
        method: String,
        /// Full route path.
        path: String,
        /// Controller key.
        controller: String,
        /// Action name.
        action: String,
    },
    /// No validator is registered under the declared rule name.
    #[error("route {method} {path}: unknown validation rule '{rule}' for field '{field}'")]
    UnknownRule {
        /// Declared method.
        method: String,
        /// Full route path.
        path: String,
        /// Field the rule is attached to.
        field: String,
        /// Rule name.
        rule: String,
    },
    /// The path pattern is malformed.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Description of the defect.
        reason: &'static str,
    },
    /// The method is empty or contains characters outside `A-Z`.
    #[error("invalid method '{method}' for route {path}")]
    InvalidMethod {
        /// Declared method.
        method: String,
        /// Full route path.
        path: String,
    },
    /// Two declarations share the same method and pattern.
    #[error("duplicate route {method} {path}")]
    DuplicateRoute {
        /// Declared method.
        method: String,
        /// Full route path.
        path: String,
    },
}

/// Failure reported by a controller action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The controller was asked for an action it does not implement.
    #[error("unknown action '{action}'")]
    UnknownAction {
        /// Requested action.
        action: String,
    },
    /// The action received the wrong number of path variables.
    #[error("action '{action}' expects {expected} argument(s), got {actual}")]
    Arity {
        /// Requested action.
        action: String,
        /// Number of arguments the action takes.
        expected: usize,
        /// Number of path variables supplied.
        actual: usize,
    },
    /// The action failed.
    #[error("{message}")]
    Failed {
        /// Description logged by the worker; never sent to callers.
        message: String,
    },
}

impl HandlerError {
    /// Builds a [`HandlerError::Failed`].
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Hard stops raised after a route matched but before a response was
/// produced.
///
/// Halts are distinct from routing outcomes such as 404 and 405, which are
/// ordinary response bodies. The transport converts each halt into its own
/// error response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchHalt {
    /// A private route was requested by an anonymous caller.
    #[error("route requires an authenticated caller")]
    Unauthenticated,
    /// One or more accepted fields failed validation.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(ValidationErrors),
    /// The controller action failed.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}
