//! Sending messages to peers that are offline.
//!
//! The sealed envelope is stored in the content-addressed store and a
//! message pointer is published in the recipient's DHT bucket, where the
//! recipient's [`MessageRetriever`](crate::MessageRetriever) finds it.

use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::info;

use crate::config::MESSAGE_POINTER_TTL_SECS;
use crate::crypto::PeerId;
use crate::envelope::{Envelope, Message};
use crate::error::InboxResult;
use crate::pointer::{Address, Locator, Pointer, PointerDirectory, Purpose};
use crate::traits::{ContentStore, PointerDht};

/// Publishes offline messages on behalf of this node.
#[derive(Clone)]
pub struct OfflineSender<D: PointerDht, C: ContentStore> {
    identity: SigningKey,
    directory: PointerDirectory<D>,
    content: C,
    ttl_secs: u64,
}

impl<D: PointerDht, C: ContentStore> OfflineSender<D, C> {
    pub fn new(identity: SigningKey, directory: PointerDirectory<D>, content: C) -> Self {
        Self {
            identity,
            directory,
            content,
            ttl_secs: MESSAGE_POINTER_TTL_SECS,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Seal `message` for `recipient` and advertise it.
    ///
    /// `recipient_key` must be the key `recipient` was derived from.
    /// `mirror` is an optional `https://` URL serving the same ciphertext;
    /// uploading it there is the caller's business.
    pub async fn send(
        &self,
        recipient: &PeerId,
        recipient_key: &VerifyingKey,
        message: Message,
        mirror: Option<&str>,
    ) -> InboxResult<Pointer> {
        let kind = message.kind();
        let ciphertext = Envelope::seal(message, &self.identity, recipient, recipient_key)?;
        let cid = self.content.add(ciphertext).await?;

        // Every address is fetched as a separate candidate, so a message
        // gets exactly one: the mirror shape already names the content id.
        let address = match mirror {
            Some(url) => Address::mirrored(&cid, url)?,
            None => Address::content(&cid),
        };

        // One pointer per message, so a later message never supersedes an
        // earlier one still waiting in the bucket.
        let pointer_id = PeerId::from_bytes(*cid.as_bytes());
        let pointer = self
            .directory
            .publish_as(
                pointer_id,
                Purpose::Message,
                Locator::for_recipient(recipient),
                self.ttl_secs,
                vec![address],
            )
            .await?;

        info!("Stored offline {:?} for {:?} as {}", kind, recipient, cid);
        Ok(pointer)
    }
}
