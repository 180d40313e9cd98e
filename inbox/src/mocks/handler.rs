//! Recording handler and acknowledgement sender.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::crypto::PeerId;
use crate::dispatch::{AckSender, MessageHandler};
use crate::envelope::{Message, MessageType};
use crate::error::{InboxError, InboxResult};

/// One handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledCall {
    pub sender: PeerId,
    pub kind: MessageType,
    pub payload: Vec<u8>,
    pub offline: bool,
}

/// Handler that records every call in one shared, ordered log.
///
/// Register the same instance for several types to observe the relative
/// order in which they were dispatched.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<HandledCall>>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the call, then fails it.
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<HandledCall> {
        self.calls.lock().clone()
    }

    pub fn kinds(&self) -> Vec<MessageType> {
        self.calls.lock().iter().map(|c| c.kind).collect()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(
        &self,
        sender: &PeerId,
        message: &Message,
        offline: bool,
    ) -> InboxResult<Option<Message>> {
        self.calls.lock().push(HandledCall {
            sender: *sender,
            kind: message.kind(),
            payload: message.payload.clone(),
            offline,
        });
        if self.fail {
            return Err(InboxError::Handler(format!(
                "RecordingHandler: simulated failure for {:?}",
                message.kind()
            )));
        }
        Ok(None)
    }
}

/// Acknowledgement sender recording `(target, sender)` pairs.
#[derive(Debug, Clone, Default)]
pub struct RecordingAcks {
    sent: Arc<Mutex<Vec<(PeerId, PeerId)>>>,
}

impl RecordingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(PeerId, PeerId)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl AckSender for RecordingAcks {
    async fn send_ack(&self, target: &PeerId, sender: &PeerId) -> InboxResult<()> {
        self.sent.lock().push((*target, *sender));
        Ok(())
    }
}
