//! Type-keyed handler table and acknowledgement emission.
//!
//! Handlers are registered once at startup through [`HandlerTableBuilder`];
//! the resulting table is immutable and shared by every fetch task.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::crypto::PeerId;
use crate::envelope::{Message, MessageType};
use crate::error::InboxResult;

/// Application handler for one message type.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle `message` from `sender`.
    ///
    /// `offline` is true for messages retrieved from the store-and-forward
    /// path. A returned message is a response the caller may deliver; the
    /// offline path only logs it.
    async fn handle(
        &self,
        sender: &PeerId,
        message: &Message,
        offline: bool,
    ) -> InboxResult<Option<Message>>;
}

/// Sends the acknowledgement that lets a retrieval source drop its copy.
#[async_trait]
pub trait AckSender: Send + Sync + 'static {
    /// Acknowledge to `target` a message signed by `sender`.
    async fn send_ack(&self, target: &PeerId, sender: &PeerId) -> InboxResult<()>;
}

type AckCallback = dyn Fn(PeerId, PeerId) -> BoxFuture<'static, InboxResult<()>> + Send + Sync;

/// Adapts a closure into an [`AckSender`].
#[derive(Clone)]
pub struct AckFn(Arc<AckCallback>);

impl AckFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(PeerId, PeerId) -> BoxFuture<'static, InboxResult<()>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

#[async_trait]
impl AckSender for AckFn {
    async fn send_ack(&self, target: &PeerId, sender: &PeerId) -> InboxResult<()> {
        (self.0)(*target, *sender).await
    }
}

/// Immutable mapping from message type to handler.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: Arc<HashMap<MessageType, Arc<dyn MessageHandler>>>,
}

impl HandlerTable {
    pub fn builder() -> HandlerTableBuilder {
        HandlerTableBuilder::default()
    }

    /// Handler registered for `kind`, if any.
    pub fn handler_for(&self, kind: MessageType) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

#[derive(Default)]
pub struct HandlerTableBuilder {
    handlers: HashMap<MessageType, Arc<dyn MessageHandler>>,
}

impl HandlerTableBuilder {
    /// Register `handler` for `kind`, replacing any earlier registration.
    #[must_use]
    pub fn register(mut self, kind: MessageType, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn build(self) -> HandlerTable {
        HandlerTable {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Routes authenticated messages to handlers and emits acknowledgements.
#[derive(Clone)]
pub struct MessageDispatcher {
    table: HandlerTable,
    acks: Arc<dyn AckSender>,
}

impl MessageDispatcher {
    pub fn new(table: HandlerTable, acks: Arc<dyn AckSender>) -> Self {
        Self { table, acks }
    }

    pub const fn table(&self) -> &HandlerTable {
        &self.table
    }

    /// Invoke the handler registered for the message's type.
    ///
    /// Types without a handler, including unknown codes, are ignored.
    /// Handler errors are returned to the caller and never retried.
    pub async fn dispatch(&self, sender: &PeerId, message: &Message) -> InboxResult<()> {
        let kind = message.kind();
        let Some(handler) = self.table.handler_for(kind) else {
            debug!("No handler for {:?} from {:?}, ignoring", kind, sender);
            return Ok(());
        };
        if let Some(response) = handler.handle(sender, message, true).await? {
            trace!(
                "Handler for {:?} produced a {:?} response, not delivered offline",
                kind,
                response.kind()
            );
        }
        Ok(())
    }

    /// Acknowledge retrieval to `fetch_source`.
    ///
    /// Returns `false` without sending for terminal types, so an ack is never
    /// acknowledged.
    pub async fn acknowledge(
        &self,
        fetch_source: &PeerId,
        sender: &PeerId,
        kind: MessageType,
    ) -> InboxResult<bool> {
        if kind.is_terminal() {
            trace!("Not acknowledging terminal {:?} from {:?}", kind, sender);
            return Ok(false);
        }
        self.acks.send_ack(fetch_source, sender).await?;
        Ok(true)
    }
}
