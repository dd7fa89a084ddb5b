//! Scripted media engine
//!
//! Records every request and lets tests emit engine events from a foreign
//! thread, the way a native player does.

use dakara_player::engine::{
    EngineEvent, EngineEventKind, EventHandler, MediaEngine, MediaHandle, MediaRequest,
    TIMING_NOT_STARTED,
};
use dakara_player::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct FakeState {
    queued: Mutex<Vec<(MediaHandle, MediaRequest)>>,
    handlers: RwLock<Vec<(EngineEventKind, EventHandler)>>,
    next_handle: AtomicU64,
    paused: AtomicBool,
    play_calls: AtomicUsize,
    timing_ms: AtomicI64,
    last_error: Mutex<Option<String>>,
    fail_commands: AtomicBool,
    stop_delay: Mutex<Duration>,
    stop_calls: AtomicUsize,
    stops_completed: AtomicUsize,
}

/// Cheap to clone; clones share the same engine
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        engine.state.timing_ms.store(TIMING_NOT_STARTED, Ordering::SeqCst);
        engine
    }

    /// Requests queued so far, oldest first
    pub fn queued(&self) -> Vec<MediaRequest> {
        self.state
            .queued
            .lock()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn last_request(&self) -> Option<MediaRequest> {
        self.state.queued.lock().last().map(|(_, request)| request.clone())
    }

    pub fn queue_count(&self) -> usize {
        self.state.queued.lock().len()
    }

    /// Handle of the last queued media
    pub fn current_handle(&self) -> Option<MediaHandle> {
        self.state.queued.lock().last().map(|(handle, _)| *handle)
    }

    pub fn is_engine_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    pub fn play_calls(&self) -> usize {
        self.state.play_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.state.stop_calls.load(Ordering::SeqCst)
    }

    /// Stops that returned, delay included
    pub fn stops_completed(&self) -> usize {
        self.state.stops_completed.load(Ordering::SeqCst)
    }

    pub fn set_timing_ms(&self, ms: i64) {
        self.state.timing_ms.store(ms, Ordering::SeqCst);
    }

    /// Make queue/play/pause fail
    pub fn set_failing(&self, failing: bool) {
        self.state.fail_commands.store(failing, Ordering::SeqCst);
    }

    /// Make stop block for `delay`
    pub fn set_stop_delay(&self, delay: Duration) {
        *self.state.stop_delay.lock() = delay;
    }

    /// Emit `kind` for `handle` from an engine thread
    pub fn emit(&self, handle: MediaHandle, kind: EngineEventKind) {
        let state = Arc::clone(&self.state);
        thread::spawn(move || {
            let handlers = state.handlers.read();
            for (subscribed, handler) in handlers.iter() {
                if *subscribed == kind {
                    handler(EngineEvent { handle, kind });
                }
            }
        })
        .join()
        .unwrap();
    }

    /// Current media reached its end
    pub fn end_reached(&self) {
        let handle = self.current_handle().expect("no media queued");
        self.emit(handle, EngineEventKind::EndReached);
    }

    /// Current media failed, with an optional error message
    pub fn engine_error(&self, message: Option<&str>) {
        *self.state.last_error.lock() = message.map(str::to_string);
        let handle = self.current_handle().expect("no media queued");
        self.emit(handle, EngineEventKind::EngineError);
    }

    fn check(&self, command: &str) -> Result<()> {
        if self.state.fail_commands.load(Ordering::SeqCst) {
            Err(Error::Engine(format!("{} refused", command)))
        } else {
            Ok(())
        }
    }
}

impl MediaEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn version(&self) -> Result<String> {
        Ok("fake 1.0".to_string())
    }

    fn queue(&self, request: &MediaRequest) -> Result<MediaHandle> {
        self.check("queue")?;
        let handle = MediaHandle(self.state.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.state.queued.lock().push((handle, request.clone()));
        self.state.paused.store(true, Ordering::SeqCst);
        self.state.timing_ms.store(TIMING_NOT_STARTED, Ordering::SeqCst);
        Ok(handle)
    }

    fn play(&self) -> Result<()> {
        self.check("play")?;
        self.state.play_calls.fetch_add(1, Ordering::SeqCst);
        self.state.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.check("pause")?;
        self.state.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_paused(&self) -> Result<bool> {
        Ok(self.state.paused.load(Ordering::SeqCst))
    }

    fn get_timing_raw(&self) -> Result<i64> {
        Ok(self.state.timing_ms.load(Ordering::SeqCst))
    }

    fn stop(&self) -> Result<()> {
        self.state.stop_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.stop_delay.lock();
        thread::sleep(delay);
        self.state.stops_completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self, kind: EngineEventKind, handler: EventHandler) {
        self.state.handlers.write().push((kind, handler));
    }

    fn last_error_message(&self) -> Option<String> {
        self.state.last_error.lock().take()
    }
}
