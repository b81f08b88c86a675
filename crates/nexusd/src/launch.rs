//! Orchestrator entry point.

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::signals::{SignalSource, SystemSignals};
use crate::telemetry::{ProcessRole, process_span};
use crate::supervisor::{
    ForkLauncher, Launcher, SOCKET_SERVICE, ServiceCatalog, Supervisor, SupervisorError,
};

const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");

/// Errors that end the orchestrator with a failure status.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The configuration lists no services.
    #[error("no services configured")]
    NoServices,
    /// Registering or supervising services failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Loads configuration from the environment and runs the orchestrator until
/// it receives `SIGTERM` or `SIGINT`.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, signal installation, registration
/// or supervision fails.
pub fn run_orchestrator() -> Result<(), LaunchError> {
    run_orchestrator_with(&SystemConfigLoader)
}

/// Runs the orchestrator with an injected configuration loader.
///
/// # Errors
///
/// See [`run_orchestrator`].
pub fn run_orchestrator_with(loader: &dyn ConfigLoader) -> Result<(), LaunchError> {
    let runtime = bootstrap_with(loader)?;
    let span = process_span(ProcessRole::Orchestrator);
    let _entered = span.enter();
    let names = runtime.config().service_names();
    if names.is_empty() {
        return Err(LaunchError::NoServices);
    }
    let shutdown_timeout = runtime.config().shutdown_timeout();
    let (context, router) = runtime.into_parts();

    let signals =
        SystemSignals::install().map_err(|source| SupervisorError::Signals { source })?;
    let launcher = ForkLauncher::new(ServiceCatalog::standard(), context, router);
    let mut supervisor = Supervisor::new(launcher, signals, shutdown_timeout);
    supervise(&mut supervisor, &names)
}

fn supervise<L: Launcher, S: SignalSource>(
    supervisor: &mut Supervisor<L, S>,
    names: &[String],
) -> Result<(), LaunchError> {
    for name in names {
        if let Err(error) = supervisor.register_service(SOCKET_SERVICE, name) {
            supervisor.shutdown();
            return Err(error.into());
        }
    }
    info!(target: LAUNCH_TARGET, services = names.len(), "orchestrator started");
    if let Err(error) = supervisor.run() {
        supervisor.shutdown();
        return Err(error.into());
    }
    info!(target: LAUNCH_TARGET, "orchestrator stopped");
    Ok(())
}
