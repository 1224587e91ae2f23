//! SSE sessions and the registry of open streams.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

/// Prefix of server-generated session ids.
pub const SESSION_ID_PREFIX: &str = "session_";

/// Generate a session id from the current time.
pub fn generate_session_id() -> String {
    let now = chrono::Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
    format!("{}{}", SESSION_ID_PREFIX, nanos)
}

/// Encode one SSE frame. Multi-line data is split across `data:` lines.
pub fn format_event(id: i64, event_type: Option<&str>, data: &str) -> String {
    let mut frame = format!("id: {}\n", id);
    if let Some(event_type) = event_type {
        frame.push_str("event: ");
        frame.push_str(event_type);
        frame.push('\n');
    }
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

/// One open event stream.
///
/// Frames are pushed into a channel drained by the HTTP response body. Sends
/// are serialized through the cursor lock, so event ids on the wire are
/// strictly increasing. Closing never waits on that lock: it flips `closed`,
/// drops the channel sender and cancels the token, which also interrupts a
/// send stuck on a full channel.
pub struct SseSession {
    id: String,
    next_event_id: Mutex<i64>,
    tx: StdMutex<Option<mpsc::Sender<String>>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    write_timeout: Duration,
}

impl SseSession {
    pub fn new(
        id: impl Into<String>,
        first_event_id: i64,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
        write_timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            next_event_id: Mutex::new(first_event_id),
            tx: StdMutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            cancel,
            write_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token cancelled when this session closes.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Write one event and return the id it was sent with.
    ///
    /// Fails without writing once the session is closed. An encode failure
    /// leaves the cursor untouched; a failed write closes the session.
    pub async fn send_event<T: Serialize + ?Sized>(
        &self,
        event_type: Option<&str>,
        payload: &T,
    ) -> Result<i64> {
        if self.is_closed() {
            return Err(Error::SessionClosed(self.id.clone()));
        }

        let mut next_event_id = self.next_event_id.lock().await;
        let tx = match self.sender() {
            Some(tx) if !self.is_closed() => tx,
            _ => return Err(Error::SessionClosed(self.id.clone())),
        };

        let data = serde_json::to_string(payload)?;
        let event_id = *next_event_id;
        let frame = format_event(event_id, event_type, &data);

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err("session closed".to_string()),
            sent = tx.send_timeout(frame, self.write_timeout) => sent.map_err(|e| e.to_string()),
        };
        drop(tx);

        match sent {
            Ok(()) => {
                *next_event_id = event_id.saturating_add(1);
                Ok(event_id)
            }
            Err(reason) => {
                if !self.is_closed() {
                    warn!("SSE write to session {} failed: {}", self.id, reason);
                }
                self.close();
                Err(Error::SessionClosed(self.id.clone()))
            }
        }
    }

    /// Write an unnamed event carrying an error response.
    pub async fn send_error(
        &self,
        id: RequestId,
        code: i32,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Result<i64> {
        let response = JsonRpcResponse::error(Some(id), JsonRpcError::new(code, message, data));
        self.send_event(None, &response).await
    }

    /// Mark the session closed and end its stream. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.cancel.cancel();
        debug!("SSE session {} closed", self.id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Open sessions keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SseSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, returning the one it replaced under the same id.
    pub async fn insert(&self, session: Arc<SseSession>) -> Option<Arc<SseSession>> {
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), session)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SseSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove `session` if it is still the registered entry for its id.
    pub async fn remove(&self, session: &Arc<SseSession>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session.id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.id());
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Close every session and clear the registry.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<SseSession>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        for session in drained {
            session.close();
        }
    }
}
