//! Test harness wiring nodes to shared mock collaborators.
//!
//! All nodes created by one [`InboxHarness`] share a DHT, a content store
//! and a mirror, so one node's outbound messages are visible to another
//! node's retriever.

use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

use market_inbox::mocks::{
    MockClock, MockContentStore, MockDht, MockMirror, RecordingAcks, RecordingHandler,
};
use market_inbox::{
    ContentId, CycleReport, Datastore, Envelope, HandlerTable, Locator, Message,
    MessageDispatcher, MessageRetriever, MessageType, OfflineSender, PeerId, Pointer,
    PointerDht, PointerDirectory, Purpose, RetrieverConfig, TransportFetcher,
    MESSAGE_POINTER_TTL_SECS,
};

/// Message types the recording handler is registered for.
const HANDLED: &[MessageType] = &[
    MessageType::Chat,
    MessageType::Follow,
    MessageType::Order,
    MessageType::OrderReject,
    MessageType::OrderCancel,
    MessageType::OrderConfirmation,
    MessageType::OrderFulfillment,
    MessageType::OrderCompletion,
    MessageType::DisputeOpen,
    MessageType::Refund,
    MessageType::OfflineAck,
];

/// Install a test-writer subscriber once. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn generate_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn peer_of(key: &SigningKey) -> PeerId {
    PeerId::from_public_key(&key.verifying_key())
}

pub type TestRetriever = MessageRetriever<MockDht, MockContentStore, MockMirror>;

/// One node with its own identity, database, handler and ack log.
#[allow(dead_code)]
pub struct Node {
    pub identity: SigningKey,
    pub peer_id: PeerId,
    pub datastore: Datastore,
    pub handler: RecordingHandler,
    pub acks: RecordingAcks,
    pub directory: PointerDirectory<MockDht>,
    pub retriever: TestRetriever,
    pub sender: OfflineSender<MockDht, MockContentStore>,
}

#[allow(dead_code)]
impl Node {
    pub fn verifying_key(&self) -> VerifyingKey {
        self.identity.verifying_key()
    }

    /// Run one cycle and return its report.
    pub async fn cycle(&self) -> CycleReport {
        self.retriever
            .run_cycle()
            .await
            .expect("Cycle should not abort")
    }

    pub fn processed_count(&self) -> usize {
        self.datastore.offline_messages().count().unwrap()
    }

    pub fn is_processed(&self, address: &str) -> bool {
        self.datastore.offline_messages().has(address).unwrap()
    }

    /// Send `kind` to `to` through the offline path.
    pub async fn send_to(&self, to: &Node, kind: MessageType, payload: &[u8]) -> Pointer {
        self.sender
            .send(
                &to.peer_id,
                &to.verifying_key(),
                Message::new(kind, payload.to_vec()),
                None,
            )
            .await
            .expect("Offline send should succeed")
    }
}

pub struct InboxHarness {
    pub dht: MockDht,
    pub content: MockContentStore,
    pub mirror: MockMirror,
    pub clock: MockClock,
    pub config: RetrieverConfig,
}

#[allow(dead_code)]
impl InboxHarness {
    pub fn new() -> Self {
        Self::with_config(RetrieverConfig::default())
    }

    pub fn with_config(config: RetrieverConfig) -> Self {
        init_tracing();
        Self {
            dht: MockDht::new(),
            content: MockContentStore::new(),
            mirror: MockMirror::new(),
            clock: MockClock::new(1_000_000),
            config,
        }
    }

    pub fn node(&self) -> Node {
        self.node_with(RecordingHandler::new(), Datastore::open_in_memory().unwrap())
    }

    pub fn node_with(&self, handler: RecordingHandler, datastore: Datastore) -> Node {
        self.node_from_key(generate_key(), handler, datastore)
    }

    pub fn node_from_key(
        &self,
        identity: SigningKey,
        handler: RecordingHandler,
        datastore: Datastore,
    ) -> Node {
        let peer_id = peer_of(&identity);
        let acks = RecordingAcks::new();

        let table = HANDLED
            .iter()
            .fold(HandlerTable::builder(), |builder, kind| {
                builder.register(*kind, Arc::new(handler.clone()))
            })
            .build();
        let dispatcher = MessageDispatcher::new(table, Arc::new(acks.clone()));

        let directory = PointerDirectory::new(
            self.dht.clone(),
            datastore.pointers(),
            Arc::new(self.clock.clone()),
            peer_id,
            self.config.prefix_len,
        );
        let fetcher =
            TransportFetcher::new(self.content.clone(), self.mirror.clone(), &self.config);
        let retriever = MessageRetriever::new(
            identity.clone(),
            directory.clone(),
            fetcher,
            datastore.offline_messages(),
            dispatcher,
            self.config.clone(),
        )
        .expect("Retriever config should be valid");
        let sender = OfflineSender::new(identity.clone(), directory.clone(), self.content.clone());

        Node {
            identity,
            peer_id,
            datastore,
            handler,
            acks,
            directory,
            retriever,
            sender,
        }
    }

    /// Sign and seal a message from `from` to `to` and put it in the content
    /// store. Returns the content id and the ciphertext.
    pub async fn seal(
        &self,
        from: &SigningKey,
        to: &Node,
        kind: MessageType,
        payload: &[u8],
    ) -> (ContentId, Vec<u8>) {
        let ciphertext = Envelope::seal(
            Message::new(kind, payload.to_vec()),
            from,
            &to.peer_id,
            &to.verifying_key(),
        )
        .unwrap();
        let cid = self.content.insert(ciphertext.clone()).await;
        (cid, ciphertext)
    }

    /// Put raw bytes in the content store.
    pub async fn store_raw(&self, bytes: Vec<u8>) -> ContentId {
        self.content.insert(bytes).await
    }

    /// Publish a message pointer in `to`'s bucket under identity `source`.
    pub async fn stash_pointer(
        &self,
        source: PeerId,
        to: &Node,
        addresses: Vec<String>,
    ) -> Pointer {
        let locator = Locator::for_recipient(&to.peer_id);
        let pointer = Pointer {
            id: source,
            locator,
            purpose: Purpose::Message,
            addresses,
            ttl_secs: MESSAGE_POINTER_TTL_SECS,
            published_at: 1_000_000,
        };
        let key = locator.prefixed(self.config.prefix_len).unwrap();
        self.dht.publish(key, pointer.clone()).await.unwrap();
        pointer
    }
}
