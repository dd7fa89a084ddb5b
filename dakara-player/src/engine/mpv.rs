//! mpv binding over the JSON IPC protocol
//!
//! mpv is spawned in idle mode with an IPC socket inside a private temporary
//! directory. Commands are JSON lines carrying a `request_id`; a reader
//! thread routes replies back to the waiting caller and turns `end-file`
//! events into [`EngineEvent`]s.
//!
//! **Threads:**
//! - Caller threads write commands and block on their reply (bounded wait)
//! - `mpv-ipc` reader thread delivers replies, logs and engine events

use super::{
    AudioSelection, EngineEvent, EngineEventKind, EventHandler, MediaEngine, MediaHandle,
    MediaRequest, TIMING_NOT_STARTED,
};
use crate::error::{Error, Result};
use dakara_common::config::PlayerConfig;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, error, info, trace, warn};

const ENGINE_NAME: &str = "mpv";
const SOCKET_NAME: &str = "mpv.sock";
const WINDOW_TITLE: &str = "Dakara player mpv";

/// Socket connection attempts while mpv starts up
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum wait for a command reply
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Reply error of a property that has no value yet (e.g. time-pos before start)
const PROPERTY_UNAVAILABLE: &str = "property unavailable";

/// mpv process settings
#[derive(Debug, Clone)]
pub struct MpvOptions {
    /// mpv executable
    pub binary: PathBuf,
    pub fullscreen: bool,
    /// Minimum level of mpv log messages forwarded to tracing
    pub loglevel: String,
    /// Extra properties applied once connected
    pub extra: Vec<(String, Value)>,
}

impl MpvOptions {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            binary: PathBuf::from(ENGINE_NAME),
            fullscreen: config.fullscreen,
            loglevel: config.loglevel.clone(),
            extra: config.mpv_options(),
        }
    }
}

/// Command reply
struct Reply {
    error: String,
    data: Value,
}

/// Media currently loaded by mpv
struct CurrentMedia {
    handle: MediaHandle,
    /// mpv playlist entry id, known once `loadfile` replied
    mpv_entry_id: Option<i64>,
    /// mpv playlist entry id of the media this one replaced
    replaced: Option<i64>,
}

/// State shared with the reader thread
struct IpcState {
    writer: Mutex<Option<UnixStream>>,
    pending: Mutex<HashMap<u64, mpsc::Sender<Reply>>>,
    next_request_id: AtomicU64,
    handlers: RwLock<Vec<(EngineEventKind, EventHandler)>>,
    current: Mutex<Option<CurrentMedia>>,
    last_error: Mutex<Option<String>>,
}

impl IpcState {
    fn handle_message(&self, message: &Value) {
        if let Some(event) = message.get("event").and_then(Value::as_str) {
            self.handle_event(event, message);
            return;
        }

        if let Some(request_id) = message.get("request_id").and_then(Value::as_u64) {
            let Some(reply_tx) = self.pending.lock().remove(&request_id) else {
                trace!("Reply to unknown mpv request {}", request_id);
                return;
            };

            let reply = Reply {
                error: message
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                data: message.get("data").cloned().unwrap_or(Value::Null),
            };

            // Caller gave up waiting
            let _ = reply_tx.send(reply);
        }
    }

    fn handle_event(&self, name: &str, message: &Value) {
        match name {
            "end-file" => self.handle_end_file(message),
            "log-message" => self.handle_log_message(message),
            _ => trace!("mpv event '{}'", name),
        }
    }

    fn handle_end_file(&self, message: &Value) {
        let reason = message.get("reason").and_then(Value::as_str).unwrap_or("");

        let kind = match reason {
            "eof" => EngineEventKind::EndReached,
            "error" => {
                if let Some(file_error) = message.get("file_error").and_then(Value::as_str) {
                    *self.last_error.lock() = Some(file_error.to_string());
                }
                EngineEventKind::EngineError
            }
            // stop (replaced by loadfile), quit, redirect
            other => {
                trace!("Ignoring end-file with reason '{}'", other);
                return;
            }
        };

        let entry_id = message.get("playlist_entry_id").and_then(Value::as_i64);

        let handle = {
            let current = self.current.lock();
            match current.as_ref() {
                Some(media) if !is_stale(media, entry_id) => media.handle,
                _ => {
                    debug!("Ignoring end-file of a replaced media");
                    return;
                }
            }
        };

        let event = EngineEvent { handle, kind };
        trace!("Delivering {:?}", event);

        let handlers = self.handlers.read();
        for (subscribed, handler) in handlers.iter() {
            if *subscribed == kind {
                handler(event);
            }
        }
    }

    fn handle_log_message(&self, message: &Value) {
        let level = message.get("level").and_then(Value::as_str).unwrap_or("debug");
        let prefix = message.get("prefix").and_then(Value::as_str).unwrap_or("");
        let text = message
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim_end();

        match level {
            "fatal" | "error" => {
                error!(target: "mpv", "{}: {}", prefix, text);
                *self.last_error.lock() = Some(format!("{}: {}", prefix, text));
            }
            "warn" => warn!(target: "mpv", "{}: {}", prefix, text),
            "info" => info!(target: "mpv", "{}: {}", prefix, text),
            _ => debug!(target: "mpv", "{}: {}", prefix, text),
        }
    }
}

/// An end-file event is stale when it belongs to a media already replaced
fn is_stale(media: &CurrentMedia, entry_id: Option<i64>) -> bool {
    let Some(entry_id) = entry_id else {
        return false;
    };

    if media.replaced == Some(entry_id) {
        return true;
    }

    matches!(media.mpv_entry_id, Some(current) if current != entry_id)
}

fn read_loop(stream: UnixStream, state: Arc<IpcState>) {
    debug!("mpv IPC reader started");

    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!("mpv IPC read error: {}", e);
                break;
            }
        };

        match serde_json::from_str::<Value>(&line) {
            Ok(message) => state.handle_message(&message),
            Err(e) => warn!("Unparsable mpv message '{}': {}", line, e),
        }
    }

    // Wake up callers still waiting for a reply
    state.pending.lock().clear();
    debug!("mpv IPC connection closed");
}

/// mpv media engine
pub struct MpvEngine {
    state: Arc<IpcState>,
    child: Mutex<Option<Child>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    next_handle: AtomicU64,
    version: String,

    /// Holds the IPC socket; removed on drop
    _runtime_dir: TempDir,
}

impl MpvEngine {
    /// Check that the mpv executable can be run
    pub fn is_available(binary: &Path) -> bool {
        Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Spawn mpv and connect to its IPC socket
    ///
    /// Fails with `MediaPlayerNotAvailable` if mpv cannot be run.
    pub fn start(options: &MpvOptions) -> Result<Self> {
        let runtime_dir = tempfile::Builder::new().prefix("dakara-mpv-").tempdir()?;
        let socket_path = runtime_dir.path().join(SOCKET_NAME);

        let mut command = Command::new(&options.binary);
        command
            .arg("--idle=yes")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg("--force-window=immediate")
            .arg("--no-input-default-bindings")
            .arg("--osc=no")
            .arg("--osd-level=0")
            .arg("--no-terminal")
            .arg(format!("--title={}", WINDOW_TITLE))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if options.fullscreen {
            command.arg("--fullscreen");
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Error::MediaPlayerNotAvailable(ENGINE_NAME.to_string())
            }
            _ => Error::Io(e),
        })?;

        let streams = connect(&socket_path, &mut child)
            .and_then(|stream| Ok((stream.try_clone()?, stream)));

        let (read_stream, write_stream) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let state = Arc::new(IpcState {
            writer: Mutex::new(Some(write_stream)),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
            current: Mutex::new(None),
            last_error: Mutex::new(None),
        });

        let reader_state = Arc::clone(&state);
        let reader = thread::Builder::new()
            .name("mpv-ipc".to_string())
            .spawn(move || read_loop(read_stream, reader_state));

        let mut engine = Self {
            state,
            child: Mutex::new(Some(child)),
            reader: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            version: String::new(),
            _runtime_dir: runtime_dir,
        };

        // Dropping the engine on error kills mpv
        *engine.reader.lock() = Some(reader?);

        engine.version = engine
            .get_property("mpv-version")?
            .as_str()
            .unwrap_or(ENGINE_NAME)
            .to_string();
        info!("{}", engine.version);

        if let Err(e) = engine.command(json!(["request_log_messages", options.loglevel])) {
            warn!("Unable to forward mpv logs: {}", e);
        }

        for (key, value) in &options.extra {
            if let Err(e) = engine.set_property(key, value.clone()) {
                error!("Unable to set mpv option '{}' to value '{}': {}", key, value, e);
            }
        }

        Ok(engine)
    }

    /// Send a command and wait for its reply
    fn request(&self, args: Value) -> Result<Reply> {
        let request_id = self.state.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = mpsc::channel();
        self.state.pending.lock().insert(request_id, reply_tx);

        let message = json!({ "command": args, "request_id": request_id });
        if let Err(e) = self.write_message(&message) {
            self.state.pending.lock().remove(&request_id);
            return Err(e);
        }

        reply_rx.recv_timeout(COMMAND_TIMEOUT).map_err(|_| {
            self.state.pending.lock().remove(&request_id);
            Error::Engine(format!("No reply from mpv to {}", args))
        })
    }

    fn command(&self, args: Value) -> Result<Value> {
        let reply = self.request(args.clone())?;

        if reply.error == "success" {
            Ok(reply.data)
        } else {
            Err(Error::Engine(format!("{} failed: {}", args, reply.error)))
        }
    }

    fn write_message(&self, message: &Value) -> Result<()> {
        let mut line = message.to_string();
        line.push('\n');

        let mut writer = self.state.writer.lock();
        let stream = writer
            .as_mut()
            .ok_or_else(|| Error::Engine("mpv is not running".to_string()))?;

        stream
            .write_all(line.as_bytes())
            .map_err(|e| Error::Engine(format!("Cannot write to mpv: {}", e)))
    }

    fn get_property(&self, name: &str) -> Result<Value> {
        self.command(json!(["get_property", name]))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.command(json!(["set_property", name, value])).map(|_| ())
    }

    fn path_list<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Value {
        Value::Array(
            paths
                .into_iter()
                .map(|path| Value::String(path.to_string_lossy().into_owned()))
                .collect(),
        )
    }
}

fn connect(socket_path: &Path, child: &mut Child) -> Result<UnixStream> {
    for attempt in 0..CONNECT_ATTEMPTS {
        match UnixStream::connect(socket_path) {
            Ok(stream) => return Ok(stream),
            Err(e) => trace!("mpv socket not ready (attempt {}): {}", attempt, e),
        }

        if let Ok(Some(status)) = child.try_wait() {
            return Err(Error::MediaPlayerNotAvailable(format!(
                "{} (exited with {})",
                ENGINE_NAME, status
            )));
        }

        thread::sleep(CONNECT_INTERVAL);
    }

    Err(Error::MediaPlayerNotAvailable(format!(
        "{} (IPC socket unreachable)",
        ENGINE_NAME
    )))
}

impl MediaEngine for MpvEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn version(&self) -> Result<String> {
        Ok(self.version.clone())
    }

    fn queue(&self, request: &MediaRequest) -> Result<MediaHandle> {
        let handle = MediaHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        // Loaded paused, started by play()
        self.set_property("pause", json!(true))?;

        let image_duration = match request.image_duration {
            Some(duration) => json!(duration.as_secs()),
            None => json!("inf"),
        };
        self.set_property("image-display-duration", image_duration)?;
        self.set_property("sub-files", Self::path_list(&request.subtitles))?;

        match &request.audio {
            AudioSelection::Auto => {
                self.set_property("audio-files", json!([]))?;
                self.set_property("aid", json!("auto"))?;
            }
            AudioSelection::File(path) => {
                self.set_property("audio-files", Self::path_list([path]))?;
                debug!("Requesting to play audio file {:?}", path);
            }
            AudioSelection::Track(track) => {
                self.set_property("audio-files", json!([]))?;
                self.set_property("aid", json!(track))?;
                debug!("Requesting to play audio track {}", track);
            }
        }

        {
            let mut current = self.state.current.lock();
            let replaced = current.as_ref().and_then(|media| media.mpv_entry_id);
            *current = Some(CurrentMedia {
                handle,
                mpv_entry_id: None,
                replaced,
            });
        }

        let data = self.command(json!([
            "loadfile",
            request.path.to_string_lossy(),
            "replace"
        ]))?;

        let mpv_entry_id = data.get("playlist_entry_id").and_then(Value::as_i64);
        if let Some(media) = self
            .state
            .current
            .lock()
            .as_mut()
            .filter(|media| media.handle == handle)
        {
            media.mpv_entry_id = mpv_entry_id;
        }

        debug!("Queued {:?} as {}", request.path, handle);
        Ok(handle)
    }

    fn play(&self) -> Result<()> {
        self.set_property("pause", json!(false))
    }

    fn pause(&self) -> Result<()> {
        self.set_property("pause", json!(true))
    }

    fn is_paused(&self) -> Result<bool> {
        Ok(self.get_property("pause")?.as_bool().unwrap_or(false))
    }

    fn get_timing_raw(&self) -> Result<i64> {
        let reply = self.request(json!(["get_property", "time-pos"]))?;

        if reply.error == PROPERTY_UNAVAILABLE {
            return Ok(TIMING_NOT_STARTED);
        }
        if reply.error != "success" {
            return Err(Error::Engine(format!("time-pos failed: {}", reply.error)));
        }

        Ok(reply
            .data
            .as_f64()
            .map(|seconds| (seconds * 1000.0).floor() as i64)
            .unwrap_or(TIMING_NOT_STARTED))
    }

    fn stop(&self) -> Result<()> {
        let Some(mut child) = self.child.lock().take() else {
            return Ok(());
        };

        info!("Stopping mpv");

        // mpv may exit before replying
        if let Err(e) = self.write_message(&json!({ "command": ["quit"] })) {
            debug!("Cannot send quit to mpv, killing it: {}", e);
            let _ = child.kill();
        }

        let status = child.wait()?;
        *self.state.writer.lock() = None;

        if let Some(reader) = self.reader.lock().take() {
            let _ = reader.join();
        }

        debug!("mpv exited with {}", status);
        Ok(())
    }

    fn subscribe(&self, kind: EngineEventKind, handler: EventHandler) {
        self.state.handlers.write().push((kind, handler));
    }

    fn last_error_message(&self) -> Option<String> {
        self.state.last_error.lock().take()
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.lock().take() {
            debug!("Killing mpv still running on drop");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn state() -> IpcState {
        IpcState {
            writer: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
            current: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    fn counting_handler(state: &IpcState, kind: EngineEventKind) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        state.handlers.write().push((
            kind,
            Box::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        count
    }

    #[test]
    fn test_reply_routed_to_pending_request() {
        let state = state();
        let (tx, rx) = mpsc::channel();
        state.pending.lock().insert(4, tx);

        state.handle_message(&json!({"request_id": 4, "error": "success", "data": "mpv 0.35.1"}));

        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.error, "success");
        assert_eq!(reply.data, json!("mpv 0.35.1"));
        assert!(state.pending.lock().is_empty());
    }

    #[test]
    fn test_end_file_eof_delivers_end_reached() {
        let state = state();
        *state.current.lock() = Some(CurrentMedia {
            handle: MediaHandle(3),
            mpv_entry_id: Some(10),
            replaced: Some(9),
        });
        let ended = counting_handler(&state, EngineEventKind::EndReached);
        let failed = counting_handler(&state, EngineEventKind::EngineError);

        state.handle_message(&json!({"event": "end-file", "reason": "eof", "playlist_entry_id": 10}));

        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert_eq!(failed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_end_file_of_replaced_media_ignored() {
        let state = state();
        *state.current.lock() = Some(CurrentMedia {
            handle: MediaHandle(3),
            mpv_entry_id: None,
            replaced: Some(9),
        });
        let ended = counting_handler(&state, EngineEventKind::EndReached);

        state.handle_message(&json!({"event": "end-file", "reason": "eof", "playlist_entry_id": 9}));
        state.handle_message(&json!({"event": "end-file", "reason": "stop", "playlist_entry_id": 10}));

        assert_eq!(ended.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_end_file_error_keeps_message() {
        let state = state();
        *state.current.lock() = Some(CurrentMedia {
            handle: MediaHandle(1),
            mpv_entry_id: Some(1),
            replaced: None,
        });
        let failed = counting_handler(&state, EngineEventKind::EngineError);

        state.handle_message(&json!({
            "event": "end-file",
            "reason": "error",
            "playlist_entry_id": 1,
            "file_error": "unrecognized file format"
        }));

        assert_eq!(failed.load(Ordering::SeqCst), 1);
        assert_eq!(
            state.last_error.lock().as_deref(),
            Some("unrecognized file format")
        );
    }

    #[test]
    fn test_missing_binary_is_not_available() {
        let options = MpvOptions {
            binary: PathBuf::from("/nonexistent/dakara/mpv"),
            fullscreen: false,
            loglevel: "info".to_string(),
            extra: Vec::new(),
        };

        assert!(!MpvEngine::is_available(&options.binary));
        assert!(matches!(
            MpvEngine::start(&options),
            Err(Error::MediaPlayerNotAvailable(_))
        ));
    }
}
