//! Process supervision: fork one worker per service, restart crashed
//! workers, relay reload requests and shut everything down on request.

mod catalog;
mod errors;
mod record;
mod spawn;

use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::signals::{ControlSignal, SignalSource};

pub use catalog::{SOCKET_SERVICE, Service, ServiceCatalog, ServiceError, ServiceFactory};
pub use errors::SupervisorError;
pub use record::{ServiceRecord, ServiceState, ServiceStatus};
pub use spawn::{ForkLauncher, Launcher};

pub(crate) const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// Pause between monitoring ticks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a non-blocking exit check.
enum Exit {
    Alive,
    Exited(String),
}

/// Orchestrator state machine over the registered services.
///
/// Records are kept in registration order and never removed; a service
/// that was shut down stays listed as [`ServiceState::Stopped`].
pub struct Supervisor<L, S> {
    launcher: L,
    signals: S,
    records: Vec<ServiceRecord>,
    shutdown_timeout: Duration,
    running: bool,
}

impl<L: Launcher, S: SignalSource> Supervisor<L, S> {
    /// Builds a supervisor with no services.
    #[must_use]
    pub const fn new(launcher: L, signals: S, shutdown_timeout: Duration) -> Self {
        Self {
            launcher,
            signals,
            records: Vec::new(),
            shutdown_timeout,
            running: false,
        }
    }

    /// Registered services in registration order.
    #[must_use]
    pub fn records(&self) -> &[ServiceRecord] {
        &self.records
    }

    /// Whether the monitoring loop is active.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Forks a worker for `name` running the catalogue class `class`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::UnknownService`] for unknown classes,
    /// [`SupervisorError::DuplicateService`] when `name` is taken, or the
    /// launcher's error when the fork fails.
    pub fn register_service(&mut self, class: &str, name: &str) -> Result<Pid, SupervisorError> {
        if !self.launcher.supports(class) {
            return Err(SupervisorError::UnknownService {
                class: class.to_owned(),
            });
        }
        if self.records.iter().any(|record| record.name == name) {
            return Err(SupervisorError::DuplicateService {
                name: name.to_owned(),
            });
        }

        let pid = self.launcher.launch(class, name)?;
        info!(
            target: SUPERVISOR_TARGET,
            service = name,
            class,
            pid = pid.as_raw(),
            "service started"
        );
        self.records.push(ServiceRecord::started(name, class, pid));
        debug!(target: SUPERVISOR_TARGET, services = ?self.status(), "service table");
        Ok(pid)
    }

    /// Monitors the services until a terminate signal arrives, then shuts
    /// them down.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Wait`] when polling a child fails for a
    /// reason other than the child being gone.
    pub fn run(&mut self) -> Result<(), SupervisorError> {
        self.running = true;
        for record in &mut self.records {
            if record.state == ServiceState::Starting {
                record.state = ServiceState::Running;
            }
        }
        info!(
            target: SUPERVISOR_TARGET,
            services = self.records.len(),
            "supervisor running"
        );

        while self.running {
            for signal in self.signals.pending() {
                match signal {
                    ControlSignal::Terminate => {
                        info!(target: SUPERVISOR_TARGET, "terminate requested");
                        self.shutdown();
                        return Ok(());
                    }
                    ControlSignal::Reload => self.reload(),
                }
            }
            self.tick()?;
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    /// Performs one monitoring pass: reaps exited workers and re-forks them.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Wait`] when polling a child fails for a
    /// reason other than the child being gone.
    pub fn tick(&mut self) -> Result<(), SupervisorError> {
        let launcher = &self.launcher;
        for record in &mut self.records {
            if !record.is_active() {
                continue;
            }
            match record.pid {
                Some(pid) => {
                    if let Exit::Exited(description) = poll_exit(&record.name, pid)? {
                        warn!(
                            target: SUPERVISOR_TARGET,
                            service = %record.name,
                            pid = pid.as_raw(),
                            exit = %description,
                            "service exited; restarting"
                        );
                        record.state = ServiceState::Crashed;
                        record.pid = None;
                        respawn(launcher, record);
                    }
                }
                None if record.state == ServiceState::Crashed => respawn(launcher, record),
                None => {}
            }
        }
        Ok(())
    }

    /// Stops every worker: `SIGTERM`, a grace period, then `SIGKILL`.
    ///
    /// Every record ends [`ServiceState::Stopped`].
    pub fn shutdown(&mut self) {
        self.running = false;
        info!(
            target: SUPERVISOR_TARGET,
            timeout_ms = self.shutdown_timeout.as_millis(),
            "shutting down services"
        );

        let mut pending: Vec<(String, Pid)> = Vec::new();
        for record in &self.records {
            if !record.is_active() {
                continue;
            }
            if let Some(pid) = record.pid {
                if let Err(error) = send(&record.name, pid, Signal::SIGTERM) {
                    warn!(target: SUPERVISOR_TARGET, error = %error, "SIGTERM failed");
                }
                pending.push((record.name.clone(), pid));
            }
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        while !pending.is_empty() && Instant::now() < deadline {
            pending.retain(|(name, pid)| !has_exited(name, *pid));
            if !pending.is_empty() {
                thread::sleep(POLL_INTERVAL);
            }
        }

        for (name, pid) in &pending {
            warn!(
                target: SUPERVISOR_TARGET,
                service = %name,
                pid = pid.as_raw(),
                "grace period elapsed; killing service"
            );
            if let Err(error) = send(name, *pid, Signal::SIGKILL) {
                warn!(target: SUPERVISOR_TARGET, error = %error, "SIGKILL failed");
            }
            if let Err(error) = waitpid(*pid, None)
                && error != Errno::ECHILD
            {
                warn!(
                    target: SUPERVISOR_TARGET,
                    service = %name,
                    error = %error,
                    "failed to reap killed service"
                );
            }
        }

        for record in &mut self.records {
            record.state = ServiceState::Stopped;
        }
        info!(target: SUPERVISOR_TARGET, "all services stopped");
    }

    /// Relays `SIGHUP` to every live worker.
    pub fn reload(&mut self) {
        info!(target: SUPERVISOR_TARGET, "relaying reload to services");
        for record in &self.records {
            if !record.is_active() {
                continue;
            }
            if let Some(pid) = record.pid
                && let Err(error) = send(&record.name, pid, Signal::SIGHUP)
            {
                warn!(target: SUPERVISOR_TARGET, error = %error, "reload relay failed");
            }
        }
    }

    /// Reports every service, probing liveness with signal 0.
    #[must_use]
    pub fn status(&self) -> Vec<ServiceStatus> {
        self.records
            .iter()
            .map(|record| {
                let alive = record.pid.is_some_and(|pid| kill(pid, None).is_ok());
                let status = if record.is_active() && !alive {
                    ServiceState::Crashed
                } else {
                    record.state
                };
                ServiceStatus {
                    name: record.name.clone(),
                    class: record.class.clone(),
                    pid: record.pid.map(Pid::as_raw),
                    uptime_secs: record.started_at.elapsed().as_secs(),
                    status,
                    restarts: record.restarts,
                }
            })
            .collect()
    }
}

fn respawn<L: Launcher>(launcher: &L, record: &mut ServiceRecord) {
    record.state = ServiceState::Restarting;
    match launcher.launch(&record.class, &record.name) {
        Ok(pid) => {
            record.pid = Some(pid);
            record.started_at = Instant::now();
            record.state = ServiceState::Running;
            record.restarts = record.restarts.saturating_add(1);
            info!(
                target: SUPERVISOR_TARGET,
                service = %record.name,
                pid = pid.as_raw(),
                restarts = record.restarts,
                failed_attempts = record.failed_restarts,
                "service restarted"
            );
            record.failed_restarts = 0;
        }
        Err(error) => {
            record.pid = None;
            record.state = ServiceState::Crashed;
            record.failed_restarts = record.failed_restarts.saturating_add(1);
            // Retried every tick; only the first failure of a streak is a warning.
            if record.failed_restarts == 1 {
                warn!(
                    target: SUPERVISOR_TARGET,
                    service = %record.name,
                    error = %error,
                    "restart failed; retrying on every tick"
                );
            } else {
                debug!(
                    target: SUPERVISOR_TARGET,
                    service = %record.name,
                    attempts = record.failed_restarts,
                    error = %error,
                    "restart still failing"
                );
            }
        }
    }
}

fn poll_exit(name: &str, pid: Pid) -> Result<Exit, SupervisorError> {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(_, code)) => Ok(Exit::Exited(format!("exit code {code}"))),
        Ok(WaitStatus::Signaled(_, signal, _)) => Ok(Exit::Exited(format!("signal {signal:?}"))),
        Ok(_) => Ok(Exit::Alive),
        Err(Errno::ECHILD) => Ok(Exit::Exited("already reaped".to_owned())),
        Err(source) => Err(SupervisorError::Wait {
            name: name.to_owned(),
            source,
        }),
    }
}

fn has_exited(name: &str, pid: Pid) -> bool {
    match poll_exit(name, pid) {
        Ok(Exit::Exited(description)) => {
            debug!(
                target: SUPERVISOR_TARGET,
                service = name,
                exit = %description,
                "service stopped"
            );
            true
        }
        Ok(Exit::Alive) => false,
        Err(error) => {
            warn!(target: SUPERVISOR_TARGET, error = %error, "wait failed during shutdown");
            false
        }
    }
}

fn send(name: &str, pid: Pid, signal: Signal) -> Result<(), SupervisorError> {
    match kill(pid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(SupervisorError::Signal {
            name: name.to_owned(),
            source,
        }),
    }
}
