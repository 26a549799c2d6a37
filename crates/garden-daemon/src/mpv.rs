//! mpv-backed `SessionController`.
//!
//! One mpv process in idle mode, driven over its JSON IPC socket:
//!
//! ```text
//!   MpvSession::connect()
//!         │
//!         ├── writer task  ← MpvRequest via mpsc, serialised → socket
//!         ├── reader task  ← JSON lines from socket
//!         │                     ├── response (request_id) → matched oneshot
//!         │                     └── event / property-change → raw event channel
//!         └── translate task ← raw events → SessionEvent tagged with the
//!                              currently loaded media id
//! ```

use async_trait::async_trait;
use garden_core::error::SessionError;
use garden_core::platform;
use garden_core::session::{MediaItem, SessionController, SessionEvent};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// Observe-property ids; matched against property-change events.
const OBS_CORE_IDLE: u64 = 1;
const OBS_PAUSE: u64 = 2;

/// Error code reported upward when mpv ends a file with reason=error.
const MPV_STREAM_ERROR_CODE: i32 = 1;

struct MpvRequest {
    req_id: u64,
    payload: String, // serialised JSON line, '\n' included
    reply: oneshot::Sender<Result<Value, SessionError>>,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, SessionError>>>>>;

/// Cheaply cloneable handle to the writer task.
#[derive(Clone)]
struct MpvHandle {
    tx: mpsc::Sender<MpvRequest>,
}

impl MpvHandle {
    async fn send(&self, command: Value) -> Result<Value, SessionError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)
            .map_err(|e| SessionError::Command(e.to_string()))?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(MpvRequest { req_id, payload: raw, reply: reply_tx })
            .await
            .map_err(|_| SessionError::Command("mpv writer task gone".to_string()))?;

        tokio::time::timeout(std::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| SessionError::Command(format!("mpv IPC timeout for req={req_id}")))?
            .map_err(|_| SessionError::Command(format!("mpv reply channel dropped req={req_id}")))?
    }
}

/// Shared transport state between commands and the translate task.
struct Transport {
    /// Item currently loaded into mpv; events are tagged with its id.
    current: Mutex<Option<MediaItem>>,
    /// Mirrors mpv `core-idle` (true = no audio flowing).
    core_idle: AtomicBool,
    /// Mirrors mpv `pause`.
    paused: AtomicBool,
}

impl Transport {
    async fn current_media_id(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(|item| item.media_id.clone())
    }

    fn is_playing(&self) -> bool {
        !self.core_idle.load(Ordering::SeqCst) && !self.paused.load(Ordering::SeqCst)
    }
}

pub struct MpvSession {
    handle: Mutex<Option<MpvHandle>>,
    process: Mutex<Option<tokio::process::Child>>,
    transport: Arc<Transport>,
    session_tx: mpsc::Sender<SessionEvent>,
    session_rx: std::sync::Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

impl MpvSession {
    pub fn new() -> Arc<Self> {
        let (session_tx, session_rx) = mpsc::channel(64);
        Arc::new(Self {
            handle: Mutex::new(None),
            process: Mutex::new(None),
            transport: Arc::new(Transport {
                current: Mutex::new(None),
                core_idle: AtomicBool::new(true),
                paused: AtomicBool::new(false),
            }),
            session_tx,
            session_rx: std::sync::Mutex::new(Some(session_rx)),
        })
    }

    async fn handle(&self) -> Result<MpvHandle, SessionError> {
        self.handle
            .lock()
            .await
            .clone()
            .ok_or_else(|| SessionError::Command("mpv not connected".to_string()))
    }

    async fn spawn_process(&self) -> Result<(), SessionError> {
        let binary = platform::find_mpv_binary()
            .ok_or_else(|| SessionError::Attach("mpv binary not found".to_string()))?;
        let socket_path = platform::mpv_socket_path();
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning {}", binary.display());
        let child = tokio::process::Command::new(binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| SessionError::Attach(format!("failed to spawn mpv: {e}")))?;
        *self.process.lock().await = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                return Ok(());
            }
        }
        Err(SessionError::Attach("mpv IPC socket did not appear".to_string()))
    }
}

#[async_trait]
impl SessionController for MpvSession {
    async fn connect(&self) -> Result<(), SessionError> {
        self.spawn_process().await?;

        let socket_path = platform::mpv_socket_path();
        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| SessionError::Attach(format!("mpv socket connect failed: {e}")))?;
        info!("mpv: connected to IPC socket");

        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<MpvRequest>(64);
        let (raw_tx, raw_rx) = mpsc::channel::<Value>(64);

        tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
        tokio::spawn(reader_task(BufReader::new(read_half), pending, raw_tx));
        tokio::spawn(translate_task(raw_rx, self.transport.clone(), self.session_tx.clone()));

        let handle = MpvHandle { tx: cmd_tx };
        for (id, name) in [(OBS_CORE_IDLE, "core-idle"), (OBS_PAUSE, "pause")] {
            handle
                .send(json!(["observe_property", id, name]))
                .await
                .map_err(|e| SessionError::Attach(format!("observe_property {name} failed: {e}")))?;
        }

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    async fn set_media_item(&self, item: MediaItem) -> Result<(), SessionError> {
        debug!(media_id = %item.media_id, uri = %item.uri, "mpv: media item set");
        *self.transport.current.lock().await = Some(item);
        Ok(())
    }

    async fn prepare(&self) -> Result<(), SessionError> {
        let uri = self
            .transport
            .current
            .lock()
            .await
            .as_ref()
            .map(|item| item.uri.clone())
            .ok_or_else(|| SessionError::Command("no media item set".to_string()))?;
        self.handle().await?.send(json!(["loadfile", uri])).await?;
        Ok(())
    }

    async fn play(&self) -> Result<(), SessionError> {
        self.handle()
            .await?
            .send(json!(["set_property", "pause", false]))
            .await?;
        Ok(())
    }

    async fn pause(&self) -> Result<(), SessionError> {
        self.handle()
            .await?
            .send(json!(["set_property", "pause", true]))
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), SessionError> {
        self.handle().await?.send(json!(["stop"])).await?;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.session_rx.lock().ok()?.take()
    }
}

// ── io tasks ──────────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<MpvRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register the reply channel before writing so the reader can match it.
        pending.lock().await.insert(req.req_id, req.reply);
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(SessionError::Command(format!("mpv write error: {e}"))));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, raw_tx: mpsc::Sender<Value>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    if let Some(tx) = pending.lock().await.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error");
                            Err(SessionError::Command(format!("mpv error: {err}")))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    let _ = raw_tx.send(val).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all_pending(&pending, &format!("mpv IPC read error: {e}")).await;
                break;
            }
        }
    }
}

async fn fail_all_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(SessionError::Command(reason.to_string())));
    }
}

/// Turn raw mpv events into [`SessionEvent`]s tagged with the currently
/// loaded media id.  Events that arrive while nothing is loaded are dropped.
async fn translate_task(
    mut raw_rx: mpsc::Receiver<Value>,
    transport: Arc<Transport>,
    session_tx: mpsc::Sender<SessionEvent>,
) {
    while let Some(raw) = raw_rx.recv().await {
        let Some(media_id) = transport.current_media_id().await else {
            continue;
        };

        let events = match raw.get("event").and_then(Value::as_str) {
            Some("property-change") => {
                let id = raw.get("id").and_then(Value::as_u64).unwrap_or(0);
                let data = raw.get("data").and_then(Value::as_bool);
                match (id, data) {
                    (OBS_CORE_IDLE, Some(idle)) => {
                        transport.core_idle.store(idle, Ordering::SeqCst);
                        if idle {
                            let mut events = vec![SessionEvent::PlayingChanged {
                                media_id: media_id.clone(),
                                playing: false,
                            }];
                            // Idle while explicitly paused is a pause, not a stall.
                            if !transport.paused.load(Ordering::SeqCst) {
                                events.push(SessionEvent::BufferingChanged { media_id, buffering: true });
                            }
                            events
                        } else {
                            vec![
                                SessionEvent::BufferingChanged { media_id: media_id.clone(), buffering: false },
                                SessionEvent::PlayingChanged {
                                    media_id,
                                    playing: !transport.paused.load(Ordering::SeqCst),
                                },
                            ]
                        }
                    }
                    (OBS_PAUSE, Some(paused)) => {
                        transport.paused.store(paused, Ordering::SeqCst);
                        vec![SessionEvent::PlayingChanged {
                            media_id,
                            playing: !paused && !transport.core_idle.load(Ordering::SeqCst),
                        }]
                    }
                    _ => Vec::new(),
                }
            }
            Some("end-file") => {
                if raw.get("reason").and_then(Value::as_str) == Some("error") {
                    warn!(media_id = %media_id, "mpv: stream ended with error");
                    vec![SessionEvent::PlaybackError { media_id, code: MPV_STREAM_ERROR_CODE }]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };

        for event in events {
            if session_tx.send(event).await.is_err() {
                return;
            }
        }
    }
    debug!("mpv translate: raw event channel closed");
}
