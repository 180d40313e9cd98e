//! Cancellations are applied after everything else fetched in the cycle.

use std::time::Duration;

use market_inbox::{Address, MessageType, PeerId};

use crate::common::harness::{generate_key, peer_of};
use crate::common::InboxHarness;

/// Confirmation behind a slow content fetch, cancellation behind a fast
/// mirror fetch, both advertised by one pointer.
#[tokio::test(start_paused = true)]
async fn test_cancel_dispatched_after_confirmation_that_finishes_later() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let vendor = generate_key();
    let buyer = generate_key();

    let (cid_a, _) = harness
        .seal(&vendor, &bob, MessageType::OrderConfirmation, b"confirmed")
        .await;
    harness
        .content
        .set_delay(&cid_a, Duration::from_millis(500))
        .await;

    let (cid_b, ciphertext_b) = harness
        .seal(&buyer, &bob, MessageType::OrderCancel, b"cancelled")
        .await;
    let mirror_url = "https://mirror.example/b";
    harness.mirror.serve(mirror_url, ciphertext_b).await;

    let source = PeerId::from_bytes([0xEE; 32]);
    harness
        .stash_pointer(
            source,
            &bob,
            vec![
                Address::content(&cid_a),
                Address::mirrored(&cid_b, mirror_url).unwrap(),
            ],
        )
        .await;

    let report = bob.cycle().await;

    assert_eq!(
        bob.handler.kinds(),
        vec![MessageType::OrderConfirmation, MessageType::OrderCancel]
    );
    assert_eq!(report.deferred, 1);
    assert_eq!(report.dispatched, 2);

    // One ack per envelope, both addressed to the retrieval source
    let mut acks = bob.acks.sent();
    acks.sort();
    let mut expected = vec![(source, peer_of(&vendor)), (source, peer_of(&buyer))];
    expected.sort();
    assert_eq!(acks, expected);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_last_among_many_slow_messages() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let peer = generate_key();

    let mut addresses = Vec::new();
    for i in 0..6u64 {
        let (cid, _) = harness
            .seal(&peer, &bob, MessageType::Chat, format!("chat {i}").as_bytes())
            .await;
        harness
            .content
            .set_delay(&cid, Duration::from_millis(100 * (i + 1)))
            .await;
        addresses.push(Address::content(&cid));
    }
    let (cancel_cid, _) = harness
        .seal(&peer, &bob, MessageType::OrderCancel, b"cancel")
        .await;
    addresses.insert(0, Address::content(&cancel_cid));

    harness
        .stash_pointer(PeerId::from_bytes([1; 32]), &bob, addresses)
        .await;
    bob.cycle().await;

    let kinds = bob.handler.kinds();
    assert_eq!(kinds.len(), 7);
    assert_eq!(kinds.last(), Some(&MessageType::OrderCancel));
    assert!(kinds[..6].iter().all(|k| *k == MessageType::Chat));
}

#[tokio::test(start_paused = true)]
async fn test_deferred_messages_keep_completion_order() {
    let harness = InboxHarness::new();
    let bob = harness.node();
    let peer = generate_key();

    let (slow, _) = harness
        .seal(&peer, &bob, MessageType::OrderCancel, b"second")
        .await;
    harness
        .content
        .set_delay(&slow, Duration::from_millis(300))
        .await;
    let (fast, _) = harness
        .seal(&peer, &bob, MessageType::OrderCancel, b"first")
        .await;

    harness
        .stash_pointer(
            PeerId::from_bytes([2; 32]),
            &bob,
            vec![Address::content(&slow), Address::content(&fast)],
        )
        .await;
    let report = bob.cycle().await;

    assert_eq!(report.deferred, 2);
    let payloads: Vec<Vec<u8>> = bob.handler.calls().into_iter().map(|c| c.payload).collect();
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[tokio::test]
async fn test_deferred_message_is_acknowledged() {
    let harness = InboxHarness::new();
    let alice = harness.node();
    let bob = harness.node();

    let pointer = alice.send_to(&bob, MessageType::OrderCancel, b"cancel").await;
    bob.cycle().await;

    assert_eq!(bob.acks.sent(), vec![(pointer.id, alice.peer_id)]);
    assert_eq!(bob.handler.kinds(), vec![MessageType::OrderCancel]);
}
