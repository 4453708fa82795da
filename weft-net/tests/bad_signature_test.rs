//! Rejection paths: a push whose transport signature does not verify, or
//! whose header is missing or inconsistent, changes no state.

mod common;

use weft_net::WeftNetError;
use weft_net_types::RecordStore;

#[tokio::test]
async fn bad_signature_is_rejected_without_state_change() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    let (tid, a_log) = common::create_thread(&a).await;
    common::invite(&a, tid, &a_log, &b, true).await;

    let admitted = b.service.metrics().records_admitted();
    let (mut req, rec) = common::build_push(&a.identity, tid, &a_log, b"payload", None);
    req.header.as_mut().unwrap().signature[0] ^= 0xFF;

    let err = b.service.push_record(req).await.unwrap_err();
    assert!(matches!(err, WeftNetError::BadSignature));
    assert_eq!(err.to_string(), "bad signature");

    assert!(!b.store.has(&rec.cid()).await.unwrap());
    assert_eq!(b.service.metrics().records_admitted(), admitted);
}

#[tokio::test]
async fn missing_header_is_rejected() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    let (tid, a_log) = common::create_thread(&a).await;
    common::invite(&a, tid, &a_log, &b, true).await;

    let (mut req, _) = common::build_push(&a.identity, tid, &a_log, b"payload", None);
    req.header = None;

    let err = b.service.push_record(req).await.unwrap_err();
    assert!(matches!(err, WeftNetError::MissingHeader));
}

#[tokio::test]
async fn mismatched_signer_key_is_rejected() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;
    let mallory = weft_model::Identity::generate();

    let (tid, a_log) = common::create_thread(&a).await;
    common::invite(&a, tid, &a_log, &b, true).await;

    // Claim to be A but attach Mallory's key.
    let (mut req, rec) = common::build_push(&a.identity, tid, &a_log, b"payload", None);
    req.header.as_mut().unwrap().key = Some(mallory.public_key().as_bytes().to_vec());

    let err = b.service.push_record(req).await.unwrap_err();
    assert!(matches!(err, WeftNetError::Signer(_)));
    assert!(!b.store.has(&rec.cid()).await.unwrap());
}

#[tokio::test]
async fn unknown_follow_key_is_rejected() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    // B was never invited: no directory entry, no follow key in the header.
    let (tid, a_log) = common::create_thread(&a).await;
    let (req, rec) = common::build_push(&a.identity, tid, &a_log, b"payload", None);

    let err = b.service.push_record(req).await.unwrap_err();
    assert!(matches!(err, WeftNetError::FollowKeyNotFound));
    assert!(!b.store.has(&rec.cid()).await.unwrap());
}
