//! New-thread join as follower: a non-readable membership document makes
//! the invitee register `/p2p/<self>` on the sender's log instead of
//! minting an own log, and the sender records the returned address.

mod common;

use weft_model::{PeerAddr, ThreadRole};
use weft_net_types::{LogStore, RecordStore};

#[tokio::test]
async fn join_as_follower_registers_address_and_mints_no_log() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    let (tid, a_log) = common::create_thread(&a).await;
    let invite_rec = common::invite(&a, tid, &a_log, &b, false).await;

    // B persisted the record and A's descriptor without a read key.
    assert!(b.store.has(&invite_rec.cid()).await.unwrap());
    let a_log_at_b = b.store.log_info(tid, a_log.id).await.unwrap().unwrap();
    assert_eq!(a_log_at_b.follow_key, a_log.follow_key);
    assert_eq!(a_log_at_b.read_key, None);

    // No own log: B is a follower, not a reader.
    let info = b.store.thread_info(tid).await.unwrap();
    assert_eq!(info.logs, vec![a_log.id]);
    assert_eq!(
        b.service.thread_role(tid).await.unwrap(),
        ThreadRole::Follower
    );

    // B registered itself as an address of A's log...
    let b_addr = PeerAddr::new(b.identity.peer_id());
    assert!(b.store.addrs(tid, a_log.id).await.unwrap().contains(&b_addr));

    // ...and the NewAddr reply landed in A's directory.
    crate::wait_until!(
        a.store.addrs(tid, a_log.id).await.unwrap().contains(&b_addr),
        "NewAddr reply never recorded at A"
    );
}

#[tokio::test]
async fn follower_still_relays_without_reading_bodies() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    let (tid, a_log) = common::create_thread(&a).await;
    common::invite(&a, tid, &a_log, &b, false).await;

    // A keeps writing; B holds the follow key so the records are admitted
    // even though their bodies stay opaque.
    let rec = a
        .service
        .add_record(tid, b"opaque to followers".to_vec(), Default::default())
        .await
        .unwrap();

    crate::wait_until!(
        b.store.has(&rec.cid()).await.unwrap(),
        "record never reached the follower"
    );
    assert_eq!(
        b.service.thread_role(tid).await.unwrap(),
        ThreadRole::Follower
    );
}
