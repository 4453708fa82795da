// Each integration test compiles as a separate binary that includes this module via `mod common;`.
// Not every test binary uses every helper, so Rust emits spurious dead_code warnings.
#![allow(dead_code)]
//! Shared test utilities for weft-net integration tests.

use prost::Message;
use std::sync::Arc;
use std::time::Duration;
use weft_logstore::MemThreadStore;
use weft_model::{crypto, Identity, LogInfo, Logs, PeerAddr, Record, ThreadId};
use weft_net::{AddSettings, ReplicationConfig, ReplicationService};
use weft_net_sim::{BroadcastGossip, ChannelNetwork, ChannelTransport, GossipNetwork};
use weft_net_types::LogStore;
use weft_proto::record_to_proto;
use weft_proto::wire;

/// Shared in-memory network: one broker for connections, one for gossip.
#[derive(Clone, Default)]
pub struct SimNet {
    pub transport: ChannelNetwork,
    pub gossip: GossipNetwork,
}

impl SimNet {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One peer: identity, combined directory/record store, running service.
pub struct TestPeer {
    pub identity: Identity,
    pub store: Arc<MemThreadStore>,
    pub service: Arc<ReplicationService<ChannelTransport>>,
}

/// Stand up a peer on the shared network with default config.
pub async fn spawn_peer(net: &SimNet) -> TestPeer {
    spawn_peer_with_config(net, ReplicationConfig::default()).await
}

pub async fn spawn_peer_with_config(net: &SimNet, config: ReplicationConfig) -> TestPeer {
    let identity = Identity::generate();
    let transport = ChannelTransport::new(identity.public_key(), &net.transport).await;
    let gossip = Arc::new(BroadcastGossip::new(identity.public_key(), &net.gossip));
    let store = Arc::new(MemThreadStore::new());
    let service = ReplicationService::new(
        identity.clone(),
        transport,
        gossip,
        store.clone(),
        store.clone(),
        config,
    )
    .await
    .expect("start service");
    TestPeer {
        identity,
        store,
        service,
    }
}

/// Create a thread on a peer with a fresh own log and subscribe to it.
pub async fn create_thread(peer: &TestPeer) -> (ThreadId, LogInfo) {
    let tid = ThreadId::new_random();
    let log = LogInfo::generate(PeerAddr::new(peer.identity.peer_id()));
    peer.store.add_log(tid, log.clone()).await.expect("add own log");
    peer.service.subscribe(tid).await.expect("subscribe");
    (tid, log)
}

/// Invite a guest into a thread: push a membership record whose event body
/// is sealed to the guest's host key. `readable` decides reader vs follower.
pub async fn invite(
    host: &TestPeer,
    tid: ThreadId,
    own: &LogInfo,
    guest: &TestPeer,
    readable: bool,
) -> Record {
    let doc = Logs::new(vec![own.public_view()], readable);
    host.service
        .add_record(
            tid,
            doc.to_borsh(),
            AddSettings {
                seal_to: Some(guest.identity.peer_id()),
                addrs: vec![PeerAddr::new(guest.identity.peer_id())],
                key_log: None,
            },
        )
        .await
        .expect("invite push")
}

/// Build a raw PushRecordRequest from a writer's log, exactly as the wire
/// would carry it. Useful for exercising the admission pipeline directly.
pub fn build_push(
    sender: &Identity,
    tid: ThreadId,
    log: &LogInfo,
    body: &[u8],
    prev: Option<weft_model::Cid>,
) -> (wire::PushRecordRequest, Record) {
    let read_key = log.read_key.expect("writer log read key");
    let follow_key = log.follow_key.expect("writer log follow key");
    let signing_key = log.priv_key.as_ref().expect("writer log signing key");

    let sealed_body = crypto::seal_sym(&read_key, body).expect("seal body");
    let rec = Record::seal(sealed_body, &follow_key, signing_key, prev, 1).expect("seal record");

    let rec_proto = record_to_proto(&rec);
    let payload = rec_proto.encode_to_vec();
    let sig = sender.sign(&payload);

    let req = wire::PushRecordRequest {
        header: Some(wire::Header {
            from: sender.peer_id().as_bytes().to_vec(),
            signature: sig.as_bytes().to_vec(),
            key: Some(sender.public_key().as_bytes().to_vec()),
            follow_key: None,
            read_key_log_id: Some(log.id.as_bytes().to_vec()),
        }),
        thread_id: tid.as_bytes().to_vec(),
        log_id: log.id.as_bytes().to_vec(),
        record: Some(rec_proto),
    };
    (req, rec)
}

/// Poll an async condition until it holds or the deadline passes.
#[macro_export]
macro_rules! wait_until {
    ($cond:expr, $msg:expr) => {{
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            if $cond {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, $msg);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }};
}

/// Small settle pause for detached background tasks.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
