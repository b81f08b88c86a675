//! Structured logging for the orchestrator and its workers.
//!
//! One subscriber is installed in the orchestrator before any fork, so every
//! worker inherits it and writes to the same stderr. Each process enters a
//! [`process_span`] naming its role, which is how interleaved lines from
//! different workers are told apart.

use std::io::{self, IsTerminal};
use std::process;

use once_cell::sync::OnceCell;
use tracing::{Span, info_span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use nexus_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Returned once the subscriber is in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter does not parse.
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        /// Rejected filter expression.
        filter: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] TryInitError),
}

/// Installs the global subscriber on first use; later calls are no-ops.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a foreign
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config))
        .map(|_| TelemetryHandle)
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter = parse_filter(config.log_filter())?;

    // Exactly one of the two layers is present.
    let (json, compact) = match config.log_format() {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(io::stderr)
                .with_timer(UtcTime::rfc_3339());
            (Some(layer), None)
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_timer(UtcTime::rfc_3339());
            (None, Some(layer))
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(compact)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn parse_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|source| TelemetryError::Filter {
        filter: filter.to_owned(),
        source,
    })
}

/// Which part of the runtime the current process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole<'a> {
    /// The supervising parent.
    Orchestrator,
    /// A forked worker serving one service.
    Worker {
        /// Service name.
        service: &'a str,
        /// Catalogue class.
        class: &'a str,
    },
}

/// Root span for the current process, carrying its role and pid.
#[must_use]
pub fn process_span(role: ProcessRole<'_>) -> Span {
    let pid = process::id();
    match role {
        ProcessRole::Orchestrator => info_span!("orchestrator", pid),
        ProcessRole::Worker { service, class } => info_span!("worker", service, class, pid),
    }
}
