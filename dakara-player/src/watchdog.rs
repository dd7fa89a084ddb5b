//! Watchdog timer for long-running operations
//!
//! A watchdog is armed before an operation that may block (stopping the
//! media engine, tearing down a worker) and disarmed once it returns. If the
//! operation overruns, the watchdog logs a single warning. It never
//! interrupts or cancels the operation it watches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// One-shot diagnostic timer
///
/// Disarmed explicitly with [`Watchdog::disarm`] or implicitly on drop.
pub struct Watchdog {
    /// Dropping the sender wakes the timer thread up before the deadline
    disarm_tx: Option<Sender<()>>,

    /// Timer thread (None if it could not be spawned)
    thread: Option<JoinHandle<()>>,

    /// Set once the warning has been emitted
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    /// Arm a watchdog emitting `message` as a warning after `timeout`
    pub fn arm(timeout: Duration, message: impl Into<String>) -> Self {
        let message = message.into();
        let (disarm_tx, disarm_rx) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);

        let spawned = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || match disarm_rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    fired_clone.store(true, Ordering::SeqCst);
                    warn!("{}", message);
                }
                // Disarmed in time
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                debug!("Could not spawn watchdog thread, running unwatched: {}", e);
                None
            }
        };

        Self {
            disarm_tx: Some(disarm_tx),
            thread,
            fired,
        }
    }

    /// Whether the warning has been emitted
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Disarm the watchdog, returning whether it fired before
    pub fn disarm(mut self) -> bool {
        self.shutdown();
        self.has_fired()
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.disarm_tx.take() {
            // Receiver is gone if the timer already fired
            let _ = tx.send(());
        }

        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarmed_in_time_does_not_fire() {
        let watchdog = Watchdog::arm(Duration::from_secs(5), "too long");
        assert!(!watchdog.disarm());
    }

    #[test]
    fn test_fires_once_after_timeout() {
        let watchdog = Watchdog::arm(Duration::from_millis(10), "too long");
        thread::sleep(Duration::from_millis(100));

        assert!(watchdog.has_fired());
        assert!(watchdog.disarm());
    }

    #[test]
    fn test_drop_disarms() {
        let watchdog = Watchdog::arm(Duration::from_secs(5), "too long");
        let fired = Arc::clone(&watchdog.fired);
        drop(watchdog);

        assert!(!fired.load(Ordering::SeqCst));
    }
}
