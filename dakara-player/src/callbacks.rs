//! Callback registry
//!
//! Named external callbacks notified by the orchestrator. Every callback
//! defaults to a no-op and can be replaced at any time by the owning
//! application. A callback is cloned out of the table before it runs, so it
//! may itself call back into the orchestrator or replace callbacks.

use dakara_common::{PlayerEvent, PlaylistEntryId};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

/// Callback receiving the entry id
pub type EntryCallback = Arc<dyn Fn(PlaylistEntryId) + Send + Sync>;

/// Callback receiving the entry id and the song timing in seconds
pub type TimingCallback = Arc<dyn Fn(PlaylistEntryId, u64) + Send + Sync>;

/// Callback receiving the entry id and an error message
pub type ErrorCallback = Arc<dyn Fn(PlaylistEntryId, &str) + Send + Sync>;

#[derive(Clone)]
struct CallbackTable {
    started_transition: EntryCallback,
    started_song: EntryCallback,
    could_not_play: EntryCallback,
    finished: EntryCallback,
    paused: TimingCallback,
    resumed: TimingCallback,
    error: ErrorCallback,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self {
            started_transition: Arc::new(|_| {}),
            started_song: Arc::new(|_| {}),
            could_not_play: Arc::new(|_| {}),
            finished: Arc::new(|_| {}),
            paused: Arc::new(|_, _| {}),
            resumed: Arc::new(|_, _| {}),
            error: Arc::new(|_, _| {}),
        }
    }
}

/// Fixed-shape table of player callbacks
#[derive(Default)]
pub struct Callbacks {
    table: RwLock<CallbackTable>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_started_transition(&self, callback: impl Fn(PlaylistEntryId) + Send + Sync + 'static) {
        self.table.write().started_transition = Arc::new(callback);
    }

    pub fn set_started_song(&self, callback: impl Fn(PlaylistEntryId) + Send + Sync + 'static) {
        self.table.write().started_song = Arc::new(callback);
    }

    pub fn set_could_not_play(&self, callback: impl Fn(PlaylistEntryId) + Send + Sync + 'static) {
        self.table.write().could_not_play = Arc::new(callback);
    }

    pub fn set_finished(&self, callback: impl Fn(PlaylistEntryId) + Send + Sync + 'static) {
        self.table.write().finished = Arc::new(callback);
    }

    pub fn set_paused(&self, callback: impl Fn(PlaylistEntryId, u64) + Send + Sync + 'static) {
        self.table.write().paused = Arc::new(callback);
    }

    pub fn set_resumed(&self, callback: impl Fn(PlaylistEntryId, u64) + Send + Sync + 'static) {
        self.table.write().resumed = Arc::new(callback);
    }

    pub fn set_error(&self, callback: impl Fn(PlaylistEntryId, &str) + Send + Sync + 'static) {
        self.table.write().error = Arc::new(callback);
    }

    /// Route every callback to a single closure receiving the event value
    pub fn set_all(&self, callback: impl Fn(PlayerEvent) + Send + Sync + 'static) {
        let callback = Arc::new(callback);
        let mut table = self.table.write();

        let cb = Arc::clone(&callback);
        table.started_transition = Arc::new(move |playlist_entry_id| {
            cb(PlayerEvent::StartedTransition { playlist_entry_id })
        });
        let cb = Arc::clone(&callback);
        table.started_song =
            Arc::new(move |playlist_entry_id| cb(PlayerEvent::StartedSong { playlist_entry_id }));
        let cb = Arc::clone(&callback);
        table.could_not_play =
            Arc::new(move |playlist_entry_id| cb(PlayerEvent::CouldNotPlay { playlist_entry_id }));
        let cb = Arc::clone(&callback);
        table.finished =
            Arc::new(move |playlist_entry_id| cb(PlayerEvent::Finished { playlist_entry_id }));
        let cb = Arc::clone(&callback);
        table.paused = Arc::new(move |playlist_entry_id, timing| {
            cb(PlayerEvent::Paused {
                playlist_entry_id,
                timing,
            })
        });
        let cb = Arc::clone(&callback);
        table.resumed = Arc::new(move |playlist_entry_id, timing| {
            cb(PlayerEvent::Resumed {
                playlist_entry_id,
                timing,
            })
        });
        table.error = Arc::new(move |playlist_entry_id, message| {
            callback(PlayerEvent::Error {
                playlist_entry_id,
                message: message.to_string(),
            })
        });
    }

    /// Forward every notification over a channel
    ///
    /// Events sent after the receiver is gone are dropped.
    pub fn forward_to(&self, tx: UnboundedSender<PlayerEvent>) {
        self.set_all(move |event| {
            if tx.send(event).is_err() {
                debug!("Player event receiver closed, event dropped");
            }
        });
    }

    /// Restore every callback to a no-op
    pub fn reset(&self) {
        *self.table.write() = CallbackTable::default();
    }

    /// Invoke the callback matching `event`
    pub(crate) fn fire(&self, event: &PlayerEvent) {
        trace!("Firing callback {} for entry {}", event.name(), event.playlist_entry_id());

        // Lock released before the call
        let table = self.table.read().clone();

        match event {
            PlayerEvent::StartedTransition { playlist_entry_id } => {
                (table.started_transition)(*playlist_entry_id)
            }
            PlayerEvent::StartedSong { playlist_entry_id } => {
                (table.started_song)(*playlist_entry_id)
            }
            PlayerEvent::CouldNotPlay { playlist_entry_id } => {
                (table.could_not_play)(*playlist_entry_id)
            }
            PlayerEvent::Finished { playlist_entry_id } => (table.finished)(*playlist_entry_id),
            PlayerEvent::Paused {
                playlist_entry_id,
                timing,
            } => (table.paused)(*playlist_entry_id, *timing),
            PlayerEvent::Resumed {
                playlist_entry_id,
                timing,
            } => (table.resumed)(*playlist_entry_id, *timing),
            PlayerEvent::Error {
                playlist_entry_id,
                message,
            } => (table.error)(*playlist_entry_id, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_defaults_are_no_ops() {
        let callbacks = Callbacks::new();
        callbacks.fire(&PlayerEvent::Finished {
            playlist_entry_id: PlaylistEntryId(1),
        });
        callbacks.fire(&PlayerEvent::Error {
            playlist_entry_id: PlaylistEntryId(1),
            message: "boom".to_string(),
        });
    }

    #[test]
    fn test_named_callback_receives_arguments() {
        let callbacks = Callbacks::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        callbacks.set_paused(move |id, timing| seen_clone.lock().push((id, timing)));

        callbacks.fire(&PlayerEvent::Paused {
            playlist_entry_id: PlaylistEntryId(42),
            timing: 25,
        });
        callbacks.fire(&PlayerEvent::Resumed {
            playlist_entry_id: PlaylistEntryId(42),
            timing: 25,
        });

        assert_eq!(*seen.lock(), vec![(PlaylistEntryId(42), 25)]);
    }

    #[test]
    fn test_callback_may_replace_callbacks() {
        let callbacks = Arc::new(Callbacks::new());
        let callbacks_clone = Arc::clone(&callbacks);

        callbacks.set_finished(move |_| callbacks_clone.reset());
        callbacks.fire(&PlayerEvent::Finished {
            playlist_entry_id: PlaylistEntryId(3),
        });
    }

    #[test]
    fn test_forward_to_channel() {
        let callbacks = Callbacks::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        callbacks.forward_to(tx);

        let event = PlayerEvent::Error {
            playlist_entry_id: PlaylistEntryId(7),
            message: "File not found".to_string(),
        };
        callbacks.fire(&event);

        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
