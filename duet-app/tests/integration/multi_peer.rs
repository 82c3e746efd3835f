use duet_files::SharedFile;
use duet_net::sim::SimNetwork;
use duet_session::{ConnectionStatus, SessionEvent};

use crate::helpers::{
    collect_events, init_test_tracing, setup_session, wait_for_event, TestTimer,
    HANDSHAKE_TIMEOUT_SECS, TRANSFER_TIMEOUT_SECS,
};

/// Carol downloads from two sharers at once; each file comes from its owner.
#[tokio::test(start_paused = true)]
async fn downloads_from_two_peers_concurrently() {
    init_test_tracing();
    let mut timer = TestTimer::new("downloads_from_two_peers_concurrently");

    let net = SimNetwork::new();
    let (alice, _alice_rx) = setup_session(&net, "alice");
    let (bob, _bob_rx) = setup_session(&net, "bob");
    let (carol, mut carol_rx) = setup_session(&net, "carol");
    let (alice_id, bob_id) = (alice.local_id().clone(), bob.local_id().clone());

    let from_alice = SharedFile::new("a.bin", vec![0xaa; 100_000]);
    let from_bob = SharedFile::new("b.bin", vec![0xbb; 140_000]);
    alice.begin_sharing(vec![from_alice.clone()]).unwrap();
    bob.begin_sharing(vec![from_bob.clone()]).unwrap();

    carol.connect_to_peer(&alice_id).unwrap();
    carol.connect_to_peer(&bob_id).unwrap();
    let mut manifests = 0;
    while manifests < 2 {
        let event = wait_for_event(&mut carol_rx, HANDSHAKE_TIMEOUT_SECS, |e| {
            matches!(e, SessionEvent::PeerManifest { .. })
        })
        .await;
        assert!(event.is_some(), "missing manifest");
        manifests += 1;
    }
    timer.phase("handshakes");

    assert_eq!(carol.request_file(from_alice.id()).await.unwrap(), alice_id);
    assert_eq!(carol.request_file(from_bob.id()).await.unwrap(), bob_id);

    let events = collect_events(&mut carol_rx, std::time::Duration::from_secs(TRANSFER_TIMEOUT_SECS)).await;
    timer.phase("transfers");

    let mut received: Vec<_> = events
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::FileReceived { peer, file } => Some((peer, file)),
            _ => None,
        })
        .collect();
    received.sort_by(|a, b| a.1.name.cmp(&b.1.name));

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].0, alice_id);
    assert_eq!(received[0].1.data, vec![0xaa; 100_000]);
    assert_eq!(received[1].0, bob_id);
    assert_eq!(received[1].1.data, vec![0xbb; 140_000]);

    let statuses = carol.statuses().await;
    assert_eq!(statuses.get(&alice_id), Some(&ConnectionStatus::Connected));
    assert_eq!(statuses.get(&bob_id), Some(&ConnectionStatus::Connected));
}

/// A file offered by two peers is requested from the first live one.
#[tokio::test(start_paused = true)]
async fn request_falls_back_after_holder_leaves() {
    init_test_tracing();

    let net = SimNetwork::new();
    let (alice, _alice_rx) = setup_session(&net, "alice");
    let (bob, _bob_rx) = setup_session(&net, "bob");
    let (carol, mut carol_rx) = setup_session(&net, "carol");
    let (alice_id, bob_id) = (alice.local_id().clone(), bob.local_id().clone());

    let shared = SharedFile::new("common.txt", b"same bytes".to_vec());
    alice.begin_sharing(vec![shared.clone()]).unwrap();
    bob.begin_sharing(vec![shared.clone()]).unwrap();

    carol.connect_to_peer(&alice_id).unwrap();
    carol.connect_to_peer(&bob_id).unwrap();
    collect_events(&mut carol_rx, std::time::Duration::from_secs(2)).await;
    assert_eq!(carol.remote_manifests().await.len(), 2);

    assert_eq!(carol.request_file(shared.id()).await.unwrap(), alice_id);
    let first = wait_for_event(&mut carol_rx, TRANSFER_TIMEOUT_SECS, |e| {
        matches!(e, SessionEvent::FileReceived { .. })
    })
    .await;
    assert!(matches!(first, Some(SessionEvent::FileReceived { ref peer, .. }) if *peer == alice_id));

    carol.remove_peer(&alice_id).unwrap();
    collect_events(&mut carol_rx, std::time::Duration::from_secs(1)).await;
    assert_eq!(carol.status(&alice_id).await, Some(ConnectionStatus::Disconnected));

    assert_eq!(carol.request_file(shared.id()).await.unwrap(), bob_id);
    let second = wait_for_event(&mut carol_rx, TRANSFER_TIMEOUT_SECS, |e| {
        matches!(e, SessionEvent::FileReceived { .. })
    })
    .await;
    match second {
        Some(SessionEvent::FileReceived { peer, file }) => {
            assert_eq!(peer, bob_id);
            assert_eq!(file.data, b"same bytes");
        }
        other => panic!("expected file from bob, got {other:?}"),
    }
}
