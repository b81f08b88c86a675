//! Signal sources polled by the supervisor and worker loops.
//!
//! Both loops drain signals without blocking once per iteration. `SIGTERM`
//! and `SIGINT` request a stop; `SIGHUP` requests a reload.

use std::ffi::c_int;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

const HANDLED: [Signal; 3] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP];

/// Control request derived from a delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop gracefully.
    Terminate,
    /// Reload without stopping.
    Reload,
}

/// Non-blocking source of [`ControlSignal`]s.
pub trait SignalSource {
    /// Drains signals delivered since the previous call.
    fn pending(&mut self) -> Vec<ControlSignal>;
}

/// Orchestrator signal source backed by `signal-hook`.
pub struct SystemSignals {
    signals: Signals,
}

impl SystemSignals {
    /// Registers handlers for `SIGTERM`, `SIGINT` and `SIGHUP`.
    ///
    /// # Errors
    ///
    /// Returns the IO error reported while registering the handlers.
    pub fn install() -> io::Result<Self> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGHUP])?;
        Ok(Self { signals })
    }
}

impl SignalSource for SystemSignals {
    fn pending(&mut self) -> Vec<ControlSignal> {
        self.signals
            .pending()
            .filter_map(|signal| match signal {
                SIGTERM | SIGINT => Some(ControlSignal::Terminate),
                SIGHUP => Some(ControlSignal::Reload),
                _ => None,
            })
            .collect()
    }
}

static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);
static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn record_signal(signal: c_int) {
    if signal == Signal::SIGHUP as c_int {
        RELOAD_REQUESTED.store(true, Ordering::SeqCst);
    } else {
        TERMINATE_REQUESTED.store(true, Ordering::SeqCst);
    }
}

/// Signal source for forked workers.
///
/// A forked child inherits the orchestrator's `signal-hook` registry, and
/// registering again in the child does not reinstall OS handlers once the
/// dispositions were reset after fork. Workers install plain handlers that
/// only set atomic flags.
#[derive(Debug)]
pub struct WorkerSignals {
    _installed: (),
}

impl WorkerSignals {
    /// Installs the flag-setting handlers for the current process.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by `sigaction`.
    pub fn install() -> Result<Self, Errno> {
        TERMINATE_REQUESTED.store(false, Ordering::SeqCst);
        RELOAD_REQUESTED.store(false, Ordering::SeqCst);
        let action = SigAction::new(
            SigHandler::Handler(record_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for handled in HANDLED {
            // SAFETY: the handler only stores to atomics, which is
            // async-signal-safe.
            unsafe { signal::sigaction(handled, &action) }?;
        }
        Ok(Self { _installed: () })
    }
}

impl SignalSource for WorkerSignals {
    fn pending(&mut self) -> Vec<ControlSignal> {
        let mut drained = Vec::new();
        if TERMINATE_REQUESTED.swap(false, Ordering::SeqCst) {
            drained.push(ControlSignal::Terminate);
        }
        if RELOAD_REQUESTED.swap(false, Ordering::SeqCst) {
            drained.push(ControlSignal::Reload);
        }
        drained
    }
}

/// Restores the default dispositions for the handled signals.
///
/// Called in freshly forked children before any service code runs.
pub(crate) fn reset_default_dispositions() {
    for handled in HANDLED {
        // SAFETY: installing the default disposition does not run any code in
        // signal context.
        if let Err(error) = unsafe { signal::signal(handled, SigHandler::SigDfl) } {
            tracing::warn!(
                target: crate::supervisor::SUPERVISOR_TARGET,
                signal = ?handled,
                error = %error,
                "failed to reset signal disposition"
            );
        }
    }
}

/// Keeps the handled signals blocked for the calling thread until dropped.
///
/// Held across `fork` so a signal aimed at a new worker stays pending until
/// the worker has installed its own handlers, instead of running the
/// inherited orchestrator handler or the default action.
#[must_use = "signals are unblocked as soon as the guard is dropped"]
#[derive(Debug)]
pub(crate) struct BlockedSignals {
    previous: SigSet,
}

impl BlockedSignals {
    /// Blocks `SIGTERM`, `SIGINT` and `SIGHUP`.
    pub(crate) fn block() -> Result<Self, Errno> {
        let mut handled = SigSet::empty();
        for signal in HANDLED {
            handled.add(signal);
        }
        let mut previous = SigSet::empty();
        signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&handled), Some(&mut previous))?;
        Ok(Self { previous })
    }
}

impl Drop for BlockedSignals {
    fn drop(&mut self) {
        if let Err(error) = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None)
        {
            tracing::warn!(
                target: crate::supervisor::SUPERVISOR_TARGET,
                error = %error,
                "failed to restore the signal mask"
            );
        }
    }
}

#[cfg(test)]
pub(crate) use manual::ManualSignals;


#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_now() -> SigSet {
        SigSet::thread_get_mask().expect("read signal mask")
    }

    #[test]
    fn blocking_guard_masks_control_signals_until_dropped() {
        let before = blocked_now();

        let guard = BlockedSignals::block().expect("block signals");
        let during = blocked_now();
        for handled in HANDLED {
            assert!(during.contains(handled), "{handled:?} not blocked");
        }

        drop(guard);
        let after = blocked_now();
        for handled in HANDLED {
            assert_eq!(after.contains(handled), before.contains(handled));
        }
    }
}
