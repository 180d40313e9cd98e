pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod fetch;
pub mod outbound;
pub mod pointer;
pub mod retriever;
pub mod storage;
pub mod traits;
mod util;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use config::*;
pub use crypto::{encrypt_for_peer, open_sealed, seal_for, verify_signature, PeerId};
pub use dispatch::{
    AckFn, AckSender, HandlerTable, HandlerTableBuilder, MessageDispatcher, MessageHandler,
};
pub use envelope::{authenticate, AuthenticatedEnvelope, Envelope, Message, MessageType};
pub use error::{InboxError, InboxResult};
pub use fetch::TransportFetcher;
pub use outbound::OfflineSender;
pub use pointer::republisher::RepublishReport;
pub use pointer::{
    Address, ContentId, Locator, Pointer, PointerDirectory, PointerRepublisher, Purpose,
};
pub use retriever::{CycleReport, MessageRetriever, StartupGate};
pub use storage::{Datastore, OfflineMessages, PointerStore};
pub use traits::{Clock, ContentStore, HttpsMirror, MirrorClient, PointerDht, SystemClock};
