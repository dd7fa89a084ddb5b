//! Worker lifecycle wrapper
//!
//! Long-lived components (the media player orchestrator) are built in two
//! steps: a pure initialization closure, then a side-effecting `load()`.
//! Once built, the worker lives inside a [`WorkerGuard`] whose drop always
//! runs the worker teardown: on normal scope exit, on early return through
//! `?`, when `load()` fails, and while unwinding from a panic.
//!
//! Teardown is watched by a [`Watchdog`]: if it overruns the configured
//! duration a single warning is logged, but teardown is never cancelled and
//! completes before the guard is gone.

use crate::error::Result;
use crate::watchdog::Watchdog;
use dakara_common::config::WatchdogConfig;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::debug;

/// Component with scoped start/stop semantics
pub trait Worker {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Side-effecting initialization (checking paths, loading assets, ...)
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Teardown, may block
    fn exit_worker(&mut self);
}

/// Teardown watchdog settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitWatchdog {
    /// Warn when teardown overruns `timeout`
    pub warn_long_exit: bool,
    pub timeout: Duration,
}

impl From<WatchdogConfig> for ExitWatchdog {
    fn from(config: WatchdogConfig) -> Self {
        Self {
            warn_long_exit: config.warn_long_exit,
            timeout: config.stop_timeout(),
        }
    }
}

impl Default for ExitWatchdog {
    fn default() -> Self {
        WatchdogConfig::default().into()
    }
}

/// Owns a worker and guarantees its teardown
pub struct WorkerGuard<W: Worker> {
    worker: W,
    exit_watchdog: ExitWatchdog,
    exited: bool,
}

impl<W: Worker> WorkerGuard<W> {
    fn new(worker: W, exit_watchdog: ExitWatchdog) -> Self {
        Self {
            worker,
            exit_watchdog,
            exited: false,
        }
    }

    /// Tear the worker down now
    ///
    /// Returns true if teardown overran the watchdog duration.
    pub fn exit(mut self) -> bool {
        self.teardown()
    }

    fn teardown(&mut self) -> bool {
        if self.exited {
            return false;
        }
        self.exited = true;

        debug!("Exiting worker {}", self.worker.name());

        let watchdog = self.exit_watchdog.warn_long_exit.then(|| {
            Watchdog::arm(
                self.exit_watchdog.timeout,
                format!("{} takes too long to stop", self.worker.name()),
            )
        });

        self.worker.exit_worker();

        let took_too_long = watchdog.map(Watchdog::disarm).unwrap_or(false);
        debug!("Exited worker {}", self.worker.name());
        took_too_long
    }
}

impl<W: Worker> Deref for WorkerGuard<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.worker
    }
}

impl<W: Worker> DerefMut for WorkerGuard<W> {
    fn deref_mut(&mut self) -> &mut W {
        &mut self.worker
    }
}

impl<W: Worker> Drop for WorkerGuard<W> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Build a worker and load it
///
/// `init` must not have side effects; nothing is torn down if it fails.
/// If `load()` fails, the worker is torn down before the error is returned.
pub fn start<W, F>(init: F, exit_watchdog: ExitWatchdog) -> Result<WorkerGuard<W>>
where
    W: Worker,
    F: FnOnce() -> Result<W>,
{
    let worker = init()?;
    let mut guard = WorkerGuard::new(worker, exit_watchdog);
    guard.load()?;
    Ok(guard)
}

/// Run `body` with a started worker, tearing it down afterwards
pub fn run<W, F, B, T>(init: F, exit_watchdog: ExitWatchdog, body: B) -> Result<T>
where
    W: Worker,
    F: FnOnce() -> Result<W>,
    B: FnOnce(&mut W) -> Result<T>,
{
    let mut guard = start(init, exit_watchdog)?;
    body(&mut *guard)
}
