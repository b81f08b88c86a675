//! Book-keeping for supervised services.

use std::time::Instant;

use nix::unistd::Pid;
use serde::Serialize;

/// Lifecycle state of a supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Forked, monitoring not yet started.
    Starting,
    /// Monitored and believed alive.
    Running,
    /// Exited unexpectedly, or could not be re-forked.
    Crashed,
    /// Being re-forked after a crash.
    Restarting,
    /// Shut down on request.
    Stopped,
}

impl ServiceState {
    /// Lower-case label used in logs and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Crashed => "crashed",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
        }
    }
}

/// One registered service, owned by the supervisor.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub(crate) name: String,
    pub(crate) class: String,
    pub(crate) pid: Option<Pid>,
    pub(crate) started_at: Instant,
    pub(crate) state: ServiceState,
    pub(crate) restarts: u32,
    pub(crate) failed_restarts: u32,
}

impl ServiceRecord {
    pub(crate) fn started(name: &str, class: &str, pid: Pid) -> Self {
        Self {
            name: name.to_owned(),
            class: class.to_owned(),
            pid: Some(pid),
            started_at: Instant::now(),
            state: ServiceState::Starting,
            restarts: 0,
            failed_restarts: 0,
        }
    }

    /// Unique service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Catalogue class the service was created from.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Current worker process, if one is running.
    #[must_use]
    pub const fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// Number of times the service has been re-forked.
    #[must_use]
    pub const fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Consecutive re-fork attempts that failed since the last success.
    #[must_use]
    pub const fn failed_restarts(&self) -> u32 {
        self.failed_restarts
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state != ServiceState::Stopped
    }
}

/// Status row reported by [`crate::supervisor::Supervisor::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// Service name.
    pub name: String,
    /// Catalogue class.
    pub class: String,
    /// Worker process id.
    pub pid: Option<i32>,
    /// Seconds since the current worker was forked.
    pub uptime_secs: u64,
    /// Lifecycle state, downgraded to crashed when the liveness probe fails.
    pub status: ServiceState,
    /// Restart count.
    pub restarts: u32,
}
