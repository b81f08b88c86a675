//! Forking workers.

use std::panic::{self, AssertUnwindSafe};
use std::process;

use nix::unistd::{ForkResult, Pid, fork};
use tracing::{debug, error, info};

use super::SUPERVISOR_TARGET;
use super::catalog::{ServiceCatalog, ServiceError};
use super::errors::SupervisorError;
use crate::context::ServiceContext;
use crate::routing::Router;
use crate::signals::{BlockedSignals, reset_default_dispositions};
use crate::telemetry::{ProcessRole, process_span};

/// Starts one worker process for a service.
pub trait Launcher {
    /// Reports whether `class` can be launched.
    fn supports(&self, class: &str) -> bool;

    /// Starts a worker and returns its process id.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] when no process could be started.
    fn launch(&self, class: &str, name: &str) -> Result<Pid, SupervisorError>;
}

/// Launches services by forking the current process.
///
/// The child inherits the catalogue, context and router, constructs the
/// service, runs its listen loop and exits with status 0 on a normal return
/// or 1 on an error or panic.
#[derive(Debug)]
pub struct ForkLauncher {
    catalog: ServiceCatalog,
    context: ServiceContext,
    router: Router,
}

impl ForkLauncher {
    /// Bundles what each child needs.
    #[must_use]
    pub const fn new(catalog: ServiceCatalog, context: ServiceContext, router: Router) -> Self {
        Self {
            catalog,
            context,
            router,
        }
    }

    /// Runs in the child with the control signals still blocked; they are
    /// unblocked once the service has installed its handlers.
    fn run_child(&self, class: &str, name: &str, blocked: BlockedSignals) -> i32 {
        reset_default_dispositions();
        set_process_title(name, class);
        let span = process_span(ProcessRole::Worker {
            service: name,
            class,
        });
        let _entered = span.enter();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), ServiceError> {
            let created = self.catalog.create(class, name, &self.context);
            drop(blocked);
            created?.listen(&self.router)
        }));
        match outcome {
            Ok(Ok(())) => {
                info!(target: SUPERVISOR_TARGET, service = name, "worker exiting");
                0
            }
            Ok(Err(failure)) => {
                error!(
                    target: SUPERVISOR_TARGET,
                    service = name,
                    error = %failure,
                    "worker failed"
                );
                1
            }
            Err(_) => {
                error!(target: SUPERVISOR_TARGET, service = name, "worker panicked");
                1
            }
        }
    }
}

impl Launcher for ForkLauncher {
    fn supports(&self, class: &str) -> bool {
        self.catalog.contains(class)
    }

    fn launch(&self, class: &str, name: &str) -> Result<Pid, SupervisorError> {
        let blocked = BlockedSignals::block().map_err(|source| SupervisorError::SignalMask {
            name: name.to_owned(),
            source,
        })?;
        // SAFETY: the orchestrator is single-threaded when it forks, so the
        // child does not inherit locks held by other threads.
        let forked = unsafe { fork() }.map_err(|source| SupervisorError::Fork {
            name: name.to_owned(),
            source,
        })?;
        match forked {
            ForkResult::Parent { child } => Ok(child),
            ForkResult::Child => process::exit(self.run_child(class, name, blocked)),
        }
    }
}

/// Labels the worker as `nexus: <name> [<class>]`. The kernel truncates the
/// name to 15 bytes.
#[cfg(target_os = "linux")]
fn set_process_title(name: &str, class: &str) {
    let Ok(title) = std::ffi::CString::new(format!("nexus: {name} [{class}]")) else {
        return;
    };
    if let Err(failure) = nix::sys::prctl::set_name(&title) {
        debug!(
            target: SUPERVISOR_TARGET,
            service = name,
            error = %failure,
            "could not set process title"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn set_process_title(name: &str, class: &str) {
    debug!(
        target: SUPERVISOR_TARGET,
        service = name,
        class,
        "process titles are not supported on this platform"
    );
}
