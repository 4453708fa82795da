//! History backfill: a peer that learns of a log mid-chain converges on
//! the full chain, and the pull boundaries behave.

mod common;

use weft_net_types::RecordStore;
use weft_proto::wire;

#[tokio::test]
async fn invitee_backfills_the_full_chain() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    let (tid, a_log) = common::create_thread(&a).await;

    // A writes history alone first.
    for i in 0..5u8 {
        a.service
            .add_record(tid, vec![b'r', i], Default::default())
            .await
            .unwrap();
    }

    // B joins mid-chain: the invite is A's sixth record, and the new-log
    // merge kicks off a background pull of everything before it.
    common::invite(&a, tid, &a_log, &b, true).await;

    crate::wait_until!(
        b.store
            .records_after(tid, a_log.id, None, 100)
            .await
            .unwrap()
            .len()
            == 6,
        "B never converged on A's chain"
    );

    let a_chain = a.store.records_after(tid, a_log.id, None, 100).await.unwrap();
    let b_chain = b.store.records_after(tid, a_log.id, None, 100).await.unwrap();
    assert_eq!(
        a_chain.iter().map(|r| r.cid()).collect::<Vec<_>>(),
        b_chain.iter().map(|r| r.cid()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn pull_records_boundaries_over_the_wire() {
    let net = common::SimNet::new();
    let a = common::spawn_peer(&net).await;
    let b = common::spawn_peer(&net).await;

    let (tid, a_log) = common::create_thread(&a).await;
    let first = a
        .service
        .add_record(tid, b"first".to_vec(), Default::default())
        .await
        .unwrap();
    let _second = a
        .service
        .add_record(tid, b"second".to_vec(), Default::default())
        .await
        .unwrap();
    common::invite(&a, tid, &a_log, &b, true).await;

    crate::wait_until!(
        b.store
            .records_after(tid, a_log.id, None, 100)
            .await
            .unwrap()
            .len()
            == 3,
        "B never converged"
    );

    // limit = 0 → empty list.
    let reply = b
        .service
        .pull_records(&wire::PullRecordsRequest {
            header: None,
            thread_id: tid.as_bytes().to_vec(),
            log_id: a_log.id.as_bytes().to_vec(),
            offset: None,
            limit: 0,
        })
        .await
        .unwrap();
    assert!(reply.records.is_empty());

    // offset is exclusive; None means the beginning of the chain.
    let reply = b
        .service
        .pull_records(&wire::PullRecordsRequest {
            header: None,
            thread_id: tid.as_bytes().to_vec(),
            log_id: a_log.id.as_bytes().to_vec(),
            offset: Some(first.cid().as_bytes().to_vec()),
            limit: 100,
        })
        .await
        .unwrap();
    assert_eq!(reply.records.len(), 2);

    // Direct client pull from B against A's addresses.
    let pulled = b
        .service
        .fetch_records(tid, a_log.id, Some(first.cid()), 100)
        .await
        .unwrap();
    assert_eq!(pulled.len(), 2);
}
