//! Tampered, forged and misaddressed candidates never reach a handler.

use market_inbox::{
    seal_for, Address, CycleReport, Envelope, Message, MessageType, PeerId, RetrieverConfig,
};

use crate::common::harness::generate_key;
use crate::common::{InboxHarness, Node};

async fn stash_bytes(harness: &InboxHarness, to: &Node, bytes: Vec<u8>) -> String {
    let cid = harness.store_raw(bytes).await;
    let address = Address::content(&cid);
    harness
        .stash_pointer(PeerId::from_bytes([0x77; 32]), to, vec![address.clone()])
        .await;
    address
}

fn assert_silently_dropped(node: &Node, report: CycleReport) {
    assert_eq!(report.dropped, 1);
    assert_eq!(report.dispatched, 0);
    assert!(node.handler.calls().is_empty(), "Handler must not see it");
    assert!(node.acks.sent().is_empty(), "No ack for unauthenticated data");
}

#[tokio::test]
async fn test_flipped_ciphertext_bits_are_dropped() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let alice = generate_key();
    let (_, ciphertext) = harness.seal(&alice, &bob, MessageType::Order, b"order").await;

    for idx in [0, 20, 40, ciphertext.len() / 2, ciphertext.len() - 1] {
        let mut tampered = ciphertext.clone();
        tampered[idx] ^= 0x01;
        // Same pointer identity: each stash supersedes the previous one
        stash_bytes(&harness, &bob, tampered).await;

        let report = bob.cycle().await;
        assert_eq!(report.dropped, 1, "Flip at byte {idx} must be dropped");
        assert_eq!(report.dispatched, 0);
    }
    assert!(bob.handler.calls().is_empty());
    assert!(bob.acks.sent().is_empty());
}

#[tokio::test]
async fn test_forged_signature_is_dropped() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let alice = generate_key();

    let mut envelope =
        Envelope::sign(Message::new(MessageType::Order, b"order".to_vec()), &alice).unwrap();
    envelope.signature[0] ^= 0x80;
    let ciphertext = seal_for(&bob.verifying_key(), &envelope.to_bytes().unwrap()).unwrap();
    stash_bytes(&harness, &bob, ciphertext).await;

    let report = bob.cycle().await;
    assert_silently_dropped(&bob, report);
}

#[tokio::test]
async fn test_substituted_sender_key_is_dropped() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let alice = generate_key();
    let mallory = generate_key();

    let mut envelope =
        Envelope::sign(Message::new(MessageType::Refund, b"refund".to_vec()), &alice).unwrap();
    envelope.sender_public_key = mallory.verifying_key().to_bytes();
    let ciphertext = seal_for(&bob.verifying_key(), &envelope.to_bytes().unwrap()).unwrap();
    stash_bytes(&harness, &bob, ciphertext).await;

    let report = bob.cycle().await;
    assert_silently_dropped(&bob, report);
}

#[tokio::test]
async fn test_garbage_plaintext_is_dropped() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let ciphertext = seal_for(&bob.verifying_key(), b"not an envelope").unwrap();
    let address = stash_bytes(&harness, &bob, ciphertext).await;

    let report = bob.cycle().await;
    assert_silently_dropped(&bob, report);
    assert!(bob.is_processed(&address), "Dropped candidates stay processed");
}

#[tokio::test]
async fn test_shared_bucket_mail_for_others_is_ignored() {
    // Zero-bit prefix: every node shares one bucket
    let harness = InboxHarness::with_config(RetrieverConfig::default().with_prefix_len(0));
    let alice = harness.node();
    let bob = harness.node();
    let carol = harness.node();

    alice.send_to(&carol, MessageType::Chat, b"for carol").await;

    let bob_report = bob.cycle().await;
    assert_eq!(bob_report.spawned, 1);
    assert_silently_dropped(&bob, bob_report);

    // Bob's database is his own; carol still gets the message
    let carol_report = carol.cycle().await;
    assert_eq!(carol_report.dispatched, 1);
    assert_eq!(carol.handler.calls()[0].sender, alice.peer_id);
}

#[tokio::test]
async fn test_offline_ack_is_handled_but_never_acknowledged() {
    let harness = InboxHarness::new();
    let alice = harness.node();
    let bob = harness.node();

    alice.send_to(&bob, MessageType::OfflineAck, b"ack").await;
    let report = bob.cycle().await;

    assert_eq!(report.dispatched, 1);
    assert_eq!(bob.handler.kinds(), vec![MessageType::OfflineAck]);
    assert!(bob.acks.sent().is_empty(), "Acks are never acked");
}
