//! Response senders used by the HTTP transport.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::http::session::SseSession;
use crate::mcp::protocol::JsonRpcResponse;
use crate::mcp::sender::ResponseSender;

#[derive(Default)]
struct Slot {
    sent: bool,
    response: Option<JsonRpcResponse>,
}

/// Captures the single response of a plain JSON request.
///
/// Only the first send is accepted; the handler's result is later written
/// as the HTTP body.
#[derive(Default)]
pub struct DirectSender {
    slot: Mutex<Slot>,
}

impl DirectSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sent(&self) -> bool {
        self.slot.lock().map(|slot| slot.sent).unwrap_or(true)
    }

    /// Take the captured response, if any.
    pub fn take(&self) -> Option<JsonRpcResponse> {
        self.slot.lock().ok().and_then(|mut slot| slot.response.take())
    }
}

#[async_trait]
impl ResponseSender for DirectSender {
    async fn send_response(&self, response: JsonRpcResponse) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Internal("response slot lock poisoned".to_string()))?;
        if slot.sent {
            return Err(Error::ResponseAlreadySent);
        }
        slot.sent = true;
        slot.response = Some(response);
        Ok(())
    }
}

/// Forwards responses to an SSE session as unnamed events.
pub struct StreamingSender {
    session: Arc<SseSession>,
    sent: AtomicBool,
}

impl StreamingSender {
    pub fn new(session: Arc<SseSession>) -> Self {
        Self {
            session,
            sent: AtomicBool::new(false),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseSender for StreamingSender {
    async fn send_response(&self, response: JsonRpcResponse) -> Result<()> {
        self.session.send_event(None, &response).await?;
        self.sent.store(true, Ordering::SeqCst);
        Ok(())
    }
}
