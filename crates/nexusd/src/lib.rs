//! Nexus orchestrator and worker runtime.
//!
//! The orchestrator (`nexusd`) forks one worker process per configured
//! service and keeps it alive. Each worker listens on
//! `<socket_dir>/service_<name>.sock`, reads one framed JSON request per
//! connection, dispatches it through the [`routing::Router`] and writes the
//! JSON response back.
//!
//! Layers, leaves first:
//!
//! - [`security`] owns the shared token used to authenticate requests;
//! - [`routing`] compiles route declarations and dispatches requests;
//! - [`transport`] runs the per-worker socket loop;
//! - [`supervisor`] forks, monitors, restarts and stops workers.
//!
//! [`client`] speaks the same framing from the caller's side.

mod app;
mod bootstrap;
pub mod client;
mod context;
mod launch;
pub mod routing;
pub mod security;
mod signals;
pub mod supervisor;
mod telemetry;
pub mod transport;

pub use app::{HOME_CONTROLLER, HomeController, default_handlers, default_manifest};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Runtime, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
    build_router,
};
pub use context::ServiceContext;
pub use launch::{LaunchError, run_orchestrator, run_orchestrator_with};
pub use signals::{ControlSignal, SignalSource, SystemSignals, WorkerSignals};
pub use telemetry::{
    ProcessRole, TelemetryError, TelemetryHandle, initialise as initialise_telemetry, process_span,
};

#[cfg(test)]
mod tests;
