//! Handshake behaviour against hand-driven peers speaking the wire protocol.

mod common;

use std::time::Duration;

use common::{recv_raw, send_raw, start_session, test_config};
use duet_crypto::{generate_key_agreement_pair, generate_signing_pair, sign};
use duet_files::SharedFile;
use duet_net::sim::{SimNetwork, SimPeer};
use duet_net::testing::{collect_events, init_test_tracing, wait_for_event, HANDSHAKE_TIMEOUT_SECS};
use duet_net::LinkEvent;
use duet_protocol::{
    decode_message, FileChunk, FileId, FileMetadata, Message, PeerId, SharedFileEntry, CHUNK_SIZE,
};
use duet_session::{ConnectionStatus, SessionConfig, SessionEvent};

/// Take `name` through the handshake with `target` by hand, up to the
/// point where `target` has verified it.
async fn verified_manual_peer(net: &SimNetwork, target: &PeerId, name: &str) -> SimPeer {
    let mut peer = net.create_peer(name).unwrap();
    peer.connect(target).unwrap();
    send_raw(&peer, target, &Message::Hello { name: name.into() });
    recv_raw(&mut peer).await;

    let agreement = generate_key_agreement_pair().unwrap();
    let signing = generate_signing_pair().unwrap();
    send_raw(
        &peer,
        target,
        &Message::KeyExchangeReply {
            dh_public_key: agreement.public_key_bytes(),
            signing_public_key: signing.public_key_bytes(),
        },
    );
    let Message::Challenge { challenge } = recv_raw(&mut peer).await else {
        panic!("expected challenge");
    };
    send_raw(
        &peer,
        target,
        &Message::ChallengeResponse {
            signature: sign(&challenge, &signing).to_vec(),
        },
    );
    assert_eq!(recv_raw(&mut peer).await, Message::VerificationComplete);
    peer
}

/// A complete three-byte cleartext file, pushed without being asked for.
fn unsolicited_file(id: &str) -> Vec<Message> {
    let file_id = FileId::from(id);
    vec![
        Message::FilesUpdate {
            files: vec![SharedFileEntry {
                id: file_id.clone(),
                name: "payload.exe".to_string(),
                size: 3,
            }],
        },
        Message::FileMetadata(FileMetadata {
            file_id: file_id.clone(),
            name: "payload.exe".to_string(),
            size: 3,
            total_chunks: 1,
            encrypted: false,
        }),
        Message::FileChunk(FileChunk {
            file_id,
            chunk_index: 0,
            data: b"bad".to_vec(),
            is_last: true,
            encrypted: false,
            iv: None,
        }),
    ]
}

#[tokio::test(start_paused = true)]
async fn wrong_signing_key_gets_error_and_nothing_else() {
    init_test_tracing();

    let net = SimNetwork::new();
    let (bob, mut bob_rx) = start_session(&net, "bob", test_config());
    let bob_id = bob.local_id().clone();
    bob.begin_sharing(vec![SharedFile::new("secret.txt", b"classified".to_vec())])
        .unwrap();

    let mut mallory = net.create_peer("mallory").unwrap();
    let mallory_id = mallory.id().clone();
    mallory.connect(&bob_id).unwrap();
    send_raw(&mallory, &bob_id, &Message::Hello { name: "mallory".into() });

    let offer = recv_raw(&mut mallory).await;
    assert!(matches!(offer, Message::KeyExchange { .. }), "got {offer:?}");

    let agreement = generate_key_agreement_pair().unwrap();
    let advertised = generate_signing_pair().unwrap();
    let actual = generate_signing_pair().unwrap();
    send_raw(
        &mallory,
        &bob_id,
        &Message::KeyExchangeReply {
            dh_public_key: agreement.public_key_bytes(),
            signing_public_key: advertised.public_key_bytes(),
        },
    );

    let challenge = match recv_raw(&mut mallory).await {
        Message::Challenge { challenge } => challenge,
        other => panic!("expected challenge, got {other:?}"),
    };
    send_raw(
        &mallory,
        &bob_id,
        &Message::ChallengeResponse {
            signature: sign(&challenge, &actual).to_vec(),
        },
    );

    let failed = wait_for_event(&mut bob_rx, HANDSHAKE_TIMEOUT_SECS, |e| {
        matches!(e, SessionEvent::HandshakeFailed { .. })
    })
    .await;
    assert!(
        matches!(failed, Some(SessionEvent::HandshakeFailed { ref peer, .. }) if *peer == mallory_id)
    );
    assert_eq!(bob.status(&mallory_id).await, Some(ConnectionStatus::Error));

    // No VerificationComplete and no manifest ever reach the impostor.
    let next = mallory.recv_event_timeout(Duration::from_secs(2)).await;
    assert!(next.is_none(), "impostor received {next:?}");
}

#[tokio::test(start_paused = true)]
async fn genuine_manual_peer_is_verified_then_sent_manifest() {
    init_test_tracing();

    let net = SimNetwork::new();
    let (bob, _bob_rx) = start_session(&net, "bob", test_config());
    let bob_id = bob.local_id().clone();
    let file = SharedFile::new("public.txt", b"hello".to_vec());
    bob.begin_sharing(vec![file.clone()]).unwrap();

    let mut carol = net.create_peer("carol").unwrap();
    let carol_id = carol.id().clone();
    carol.connect(&bob_id).unwrap();
    send_raw(&carol, &bob_id, &Message::Hello { name: "carol".into() });
    recv_raw(&mut carol).await;

    let agreement = generate_key_agreement_pair().unwrap();
    let signing = generate_signing_pair().unwrap();
    send_raw(
        &carol,
        &bob_id,
        &Message::KeyExchangeReply {
            dh_public_key: agreement.public_key_bytes(),
            signing_public_key: signing.public_key_bytes(),
        },
    );
    let Message::Challenge { challenge } = recv_raw(&mut carol).await else {
        panic!("expected challenge");
    };
    send_raw(
        &carol,
        &bob_id,
        &Message::ChallengeResponse {
            signature: sign(&challenge, &signing).to_vec(),
        },
    );

    assert_eq!(recv_raw(&mut carol).await, Message::VerificationComplete);
    assert_eq!(
        recv_raw(&mut carol).await,
        Message::FilesUpdate {
            files: vec![file.entry.clone()]
        }
    );
    // Mutual mode: bob waits for carol's verification before connecting.
    assert_eq!(bob.status(&carol_id).await, Some(ConnectionStatus::Verifying));
}

#[tokio::test(start_paused = true)]
async fn unsolicited_response_and_garbage_only_affect_that_peer() {
    init_test_tracing();

    let net = SimNetwork::new();
    let (alice, mut alice_rx) = start_session(&net, "alice", test_config());
    let (bob, mut bob_rx) = start_session(&net, "bob", test_config());
    let (alice_id, bob_id) = (alice.local_id().clone(), bob.local_id().clone());

    let mut mallory = net.create_peer("mallory").unwrap();
    let mallory_id = mallory.id().clone();
    mallory.connect(&bob_id).unwrap();

    // Undecodable bytes are dropped without failing the handshake.
    mallory.send(&bob_id, vec![0xff, 0xff, 0xff].into()).unwrap();
    send_raw(&mallory, &bob_id, &Message::Hello { name: "mallory".into() });
    recv_raw(&mut mallory).await;
    assert_eq!(bob.status(&mallory_id).await, Some(ConnectionStatus::Connecting));

    send_raw(
        &mallory,
        &bob_id,
        &Message::ChallengeResponse {
            signature: vec![0; 64],
        },
    );
    let failed = wait_for_event(&mut bob_rx, HANDSHAKE_TIMEOUT_SECS, |e| {
        matches!(e, SessionEvent::HandshakeFailed { .. })
    })
    .await;
    assert!(failed.is_some());
    assert_eq!(bob.status(&mallory_id).await, Some(ConnectionStatus::Error));

    // A genuine peer still gets through.
    alice.connect_to_peer(&bob_id).unwrap();
    let connected = wait_for_event(&mut alice_rx, HANDSHAKE_TIMEOUT_SECS, |e| {
        matches!(e, SessionEvent::StatusChanged { status: ConnectionStatus::Connected, .. })
    })
    .await;
    assert!(connected.is_some());
    assert_eq!(bob.status(&alice_id).await, Some(ConnectionStatus::Connected));
    assert_eq!(bob.status(&mallory_id).await, Some(ConnectionStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn failed_handshake_stops_file_send_in_progress() {
    init_test_tracing();

    let net = SimNetwork::new();
    let slow = SessionConfig {
        chunk_delay: Duration::from_secs(1),
        ..test_config()
    };
    let (bob, mut bob_rx) = start_session(&net, "bob", slow);
    let bob_id = bob.local_id().clone();
    let file = SharedFile::new("movie.bin", vec![7; 6 * CHUNK_SIZE]);
    bob.begin_sharing(vec![file.clone()]).unwrap();

    let mut carol = verified_manual_peer(&net, &bob_id, "carol").await;
    let carol_id = carol.id().clone();
    assert!(matches!(recv_raw(&mut carol).await, Message::FilesUpdate { .. }));

    send_raw(
        &carol,
        &bob_id,
        &Message::RequestFile {
            file_id: file.id().clone(),
        },
    );
    assert!(matches!(recv_raw(&mut carol).await, Message::FileMetadata(_)));
    assert!(matches!(recv_raw(&mut carol).await, Message::FileChunk(_)));

    // Bob holds no challenge for carol, so this response fails its session.
    send_raw(
        &carol,
        &bob_id,
        &Message::ChallengeResponse {
            signature: vec![0; 64],
        },
    );
    let failed = wait_for_event(&mut bob_rx, HANDSHAKE_TIMEOUT_SECS, |e| {
        matches!(e, SessionEvent::HandshakeFailed { .. })
    })
    .await;
    assert!(failed.is_some());
    assert_eq!(bob.status(&carol_id).await, Some(ConnectionStatus::Error));

    let mut late_chunks = 0;
    while let Some(event) = carol.recv_event_timeout(Duration::from_secs(10)).await {
        if let LinkEvent::Message { data, .. } = event {
            if matches!(decode_message(&data).unwrap(), Message::FileChunk(_)) {
                late_chunks += 1;
            }
        }
    }
    assert_eq!(late_chunks, 0, "chunks kept flowing after the handshake failed");
}

#[tokio::test(start_paused = true)]
async fn unrequested_file_transfers_are_dropped() {
    init_test_tracing();

    let net = SimNetwork::new();
    let (bob, mut bob_rx) = start_session(&net, "bob", test_config());
    let bob_id = bob.local_id().clone();

    // Never got past opening the link.
    let mallory = net.create_peer("mallory").unwrap();
    let mallory_id = mallory.id().clone();
    mallory.connect(&bob_id).unwrap();
    for msg in unsolicited_file("from-mallory") {
        send_raw(&mallory, &bob_id, &msg);
    }

    // Verified, but bob never asked it for anything.
    let carol = verified_manual_peer(&net, &bob_id, "carol").await;
    let file_from_carol = unsolicited_file("from-carol");
    for msg in &file_from_carol[1..] {
        send_raw(&carol, &bob_id, msg);
    }

    let events = collect_events(&mut bob_rx, Duration::from_secs(2)).await;
    assert!(
        events.iter().all(|e| !matches!(
            e,
            SessionEvent::FileReceived { .. }
                | SessionEvent::Progress { .. }
                | SessionEvent::TransferFailed { .. }
                | SessionEvent::PeerManifest { .. }
        )),
        "unrequested transfer surfaced: {events:?}"
    );
    assert!(bob.progress().await.is_empty());
    assert!(bob.remote_manifests().await.is_empty());
    assert_eq!(bob.status(&mallory_id).await, Some(ConnectionStatus::Connecting));
}
