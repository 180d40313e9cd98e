//! Outbound sending, pointer supersede and republishing.

use std::sync::Arc;

use market_inbox::{
    Address, ContentId, InboxError, Locator, Message, MessageType, PointerDht,
    PointerRepublisher, Purpose, DEFAULT_POINTER_TTL_SECS, MESSAGE_POINTER_TTL_SECS,
};

use crate::common::harness::generate_key;
use crate::common::InboxHarness;

#[tokio::test]
async fn test_outbound_roundtrip_between_nodes() {
    let harness = InboxHarness::new();
    let alice = harness.node();
    let bob = harness.node();

    alice.send_to(&bob, MessageType::Order, b"1 chair").await;
    bob.send_to(&alice, MessageType::OrderConfirmation, b"chair confirmed").await;

    assert_eq!(bob.cycle().await.dispatched, 1);
    assert_eq!(alice.cycle().await.dispatched, 1);

    assert_eq!(bob.handler.calls()[0].payload, b"1 chair");
    assert_eq!(bob.handler.calls()[0].sender, alice.peer_id);
    assert_eq!(alice.handler.calls()[0].kind, MessageType::OrderConfirmation);
    assert_eq!(alice.handler.calls()[0].sender, bob.peer_id);
}

#[tokio::test]
async fn test_send_to_substituted_key_publishes_nothing() {
    let harness = InboxHarness::new();
    let alice = harness.node();
    let bob = harness.node();
    let mallory = generate_key();

    let result = alice
        .sender
        .send(
            &bob.peer_id,
            &mallory.verifying_key(),
            Message::new(MessageType::Chat, b"secret".to_vec()),
            None,
        )
        .await;

    assert!(matches!(result, Err(InboxError::Crypto(_))));
    assert_eq!(harness.dht.record_count().await, 0);
    assert_eq!(bob.cycle().await.spawned, 0);
}

#[tokio::test]
async fn test_moderator_pointer_superseded_on_republish() {
    let harness = InboxHarness::new();
    let node = harness.node();
    let locator = Locator::from_bytes([0x42; 32]);

    node.directory
        .publish(
            Purpose::Moderator,
            locator,
            DEFAULT_POINTER_TTL_SECS,
            Address::content(&ContentId::of(b"profile v1")),
        )
        .await
        .unwrap();
    node.directory
        .publish(
            Purpose::Moderator,
            locator,
            DEFAULT_POINTER_TTL_SECS,
            Address::content(&ContentId::of(b"profile v2")),
        )
        .await
        .unwrap();

    let key = locator.prefixed(harness.config.prefix_len).unwrap();
    let live = harness.dht.pointers_at(&key).await;
    assert_eq!(live.len(), 1);
    assert_eq!(
        live[0].addresses,
        vec![Address::content(&ContentId::of(b"profile v2"))]
    );
    assert_eq!(node.directory.store().get_all().unwrap().len(), 1);

    // Stepping down forgets the bookkeeping row
    assert_eq!(node.directory.delete_all(Purpose::Moderator).unwrap(), 1);
    assert!(node.directory.store().get_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_republisher_prunes_expired_message_pointers() {
    let harness = InboxHarness::new();
    let alice = harness.node();
    let bob = harness.node();

    alice.send_to(&bob, MessageType::Chat, b"old").await;
    harness.clock.advance(MESSAGE_POINTER_TTL_SECS / 2);
    alice.send_to(&bob, MessageType::Chat, b"new").await;

    let republisher =
        PointerRepublisher::new(alice.directory.clone(), Arc::new(harness.clock.clone()));

    let report = republisher.republish_once().await.unwrap();
    assert_eq!((report.republished, report.pruned), (2, 0));

    harness.clock.advance(MESSAGE_POINTER_TTL_SECS / 2 + 1);
    let report = republisher.republish_once().await.unwrap();
    assert_eq!((report.republished, report.pruned), (1, 1));

    let left = alice.directory.store().get_by_purpose(Purpose::Message).unwrap();
    assert_eq!(left.len(), 1);
    let key = left[0].locator.prefixed(harness.config.prefix_len).unwrap();
    assert!(harness
        .dht
        .pointers_at(&key)
        .await
        .iter()
        .any(|p| p.id == left[0].id));
}

#[tokio::test]
async fn test_republished_pointer_is_not_refetched() {
    let harness = InboxHarness::new();
    let alice = harness.node();
    let bob = harness.node();
    let pointer = alice.send_to(&bob, MessageType::Chat, b"hi").await;

    assert_eq!(bob.cycle().await.dispatched, 1);

    // Same record pushed again by the sender
    let key = pointer.locator.prefixed(harness.config.prefix_len).unwrap();
    harness.dht.publish(key, pointer).await.unwrap();

    let report = bob.cycle().await;
    assert_eq!(report.spawned, 0);
    assert_eq!(report.skipped_processed, 1);
    assert_eq!(bob.handler.calls().len(), 1);
}
