//! ReplicationService — the thread protocol state machine
//!
//! Implements the four wire operations (GetLogs, PushRecord, PullRecords,
//! and pubsub delivery via the subscription loop), the bootstrap/merge
//! logic for newly discovered logs, and the concurrent fan-out for
//! outbound records. All four operations are symmetric: the same service
//! serves them and invokes them as a client.

use crate::config::ReplicationConfig;
use crate::error::WeftNetError;
use crate::framing::{MessageSink, MessageStream};
use crate::metrics::ReplicationMetrics;
use crate::subscriber;
use prost::Message;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use weft_model::{
    crypto, AddrTtl, CipherKey, Cid, Identity, LogId, LogInfo, Logs, PeerAddr, PeerId, PubKey,
    Record, Signature, SymKey, ThreadId, ThreadRole,
};
use weft_net_types::transport::{BiStream, Connection, Transport};
use weft_net_types::{GossipLayer, LogStore, RecordStore};
use weft_proto::wire::{self, thread_message};
use weft_proto::{log_from_proto, log_to_proto, record_from_proto, record_to_proto};

type SendHalf<T> =
    <<<T as Transport>::Connection as Connection>::Stream as BiStream>::SendStream;
type RecvHalf<T> =
    <<<T as Transport>::Connection as Connection>::Stream as BiStream>::RecvStream;

/// Caller-supplied options for writing a record.
#[derive(Debug, Clone, Default)]
pub struct AddSettings {
    /// Which log's read key seals the event body (and is named in the
    /// request header). Defaults to the writing log itself.
    pub key_log: Option<LogId>,
    /// Seal the event body to a peer's host key instead of a read key.
    /// This is the invite path: the recipient may not hold any key yet.
    pub seal_to: Option<PeerId>,
    /// Extra fan-out addresses beyond the thread's known writers.
    pub addrs: Vec<PeerAddr>,
}

/// The replication core of a weft peer.
///
/// Holds the host identity and the seams to its collaborators: transport,
/// gossip, the log directory, and the record store. One subscription loop
/// runs per subscribed thread; every inbound connection and fan-out target
/// gets its own task.
pub struct ReplicationService<T: Transport> {
    identity: Identity,
    transport: Arc<T>,
    gossip: Arc<dyn GossipLayer>,
    directory: Arc<dyn LogStore>,
    store: Arc<dyn RecordStore>,
    config: ReplicationConfig,
    metrics: Arc<ReplicationMetrics>,
    thread_tokens: Mutex<HashMap<ThreadId, CancellationToken>>,
    admit_locks: Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
    cancel: CancellationToken,
}

impl<T: Transport> ReplicationService<T> {
    /// Start the service: spawn the accept loop and re-subscribe every
    /// thread already present in the directory.
    pub async fn new(
        identity: Identity,
        transport: T,
        gossip: Arc<dyn GossipLayer>,
        directory: Arc<dyn LogStore>,
        store: Arc<dyn RecordStore>,
        config: ReplicationConfig,
    ) -> Result<Arc<Self>, WeftNetError> {
        let service = Arc::new(Self {
            identity,
            transport: Arc::new(transport),
            gossip,
            directory,
            store,
            config,
            metrics: Arc::new(ReplicationMetrics::default()),
            thread_tokens: Mutex::new(HashMap::new()),
            admit_locks: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        });

        tokio::spawn(crate::handlers::run_accept_loop(service.clone()));

        for tid in service.directory.threads().await? {
            service.subscribe(tid).await?;
        }

        Ok(service)
    }

    /// The host identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Replication counters.
    pub fn metrics(&self) -> &ReplicationMetrics {
        &self.metrics
    }

    /// The log directory seam.
    pub fn directory(&self) -> &Arc<dyn LogStore> {
        &self.directory
    }

    /// The record store seam.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub(crate) fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every loop and shut down gossip. No task outlives this.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.gossip.shutdown().await;
        self.thread_tokens.lock().await.clear();
    }

    /// The role this peer currently occupies for a thread, derived from the
    /// directory's key material.
    pub async fn thread_role(&self, thread: ThreadId) -> Result<ThreadRole, WeftNetError> {
        let info = self.directory.thread_info(thread).await?;
        if info.logs.is_empty() {
            return Ok(ThreadRole::Absent);
        }
        for lid in &info.logs {
            if self.directory.read_key(thread, *lid).await?.is_some() {
                return Ok(ThreadRole::Reader);
            }
        }
        Ok(ThreadRole::Follower)
    }

    // ==================== Wire operations (server side) ====================

    /// Serve a GetLogs request: every log this peer knows for the thread,
    /// keys and addresses included. The caller would receive the same data
    /// on admission, so there is no authentication beyond transport.
    pub async fn get_logs(
        &self,
        req: &wire::GetLogsRequest,
    ) -> Result<wire::GetLogsReply, WeftNetError> {
        let tid = ThreadId::from_slice(&req.thread_id).map_err(WeftNetError::Protocol)?;
        let info = self.directory.thread_info(tid).await?;
        let mut logs = Vec::with_capacity(info.logs.len());
        for lid in info.logs {
            if let Some(lg) = self.directory.log_info(tid, lid).await? {
                logs.push(log_to_proto(&lg));
            }
        }
        Ok(wire::GetLogsReply { logs })
    }

    /// Serve a PushRecord request — the admission pipeline.
    ///
    /// Verification order: header presence, signer resolution, transport
    /// signature, envelope key selection, decode, dedup, then the known-log
    /// or new-log merge. The reply's `new_addr` is computed before the
    /// record is persisted. Admissions are serialized per thread so the
    /// gossip and direct paths cannot double-merge a racing record.
    pub async fn push_record(
        self: &Arc<Self>,
        req: wire::PushRecordRequest,
    ) -> Result<wire::PushRecordReply, WeftNetError> {
        let header = req.header.as_ref().ok_or(WeftNetError::MissingHeader)?;
        let tid = ThreadId::from_slice(&req.thread_id).map_err(WeftNetError::Protocol)?;
        let lid = LogId::try_from(req.log_id.as_slice())
            .map_err(|_| WeftNetError::Protocol("invalid log id".into()))?;
        let rec_proto = req
            .record
            .as_ref()
            .ok_or_else(|| WeftNetError::Protocol("request record is required".into()))?;

        // Verify the request
        let signer = request_pub_key(header)?;
        verify_request_signature(rec_proto, &signer, &header.signature)?;

        // Unpack the record
        let follow_key = match &header.follow_key {
            Some(key) => Some(
                SymKey::try_from(key.as_slice())
                    .map_err(|_| WeftNetError::Protocol("invalid follow key".into()))?,
            ),
            None => self.directory.follow_key(tid, lid).await?,
        }
        .ok_or(WeftNetError::FollowKeyNotFound)?;

        let rec = record_from_proto(rec_proto, &follow_key)?;

        let admit = self.admit_lock(tid).await;
        let _guard = admit.lock().await;

        if self.store.has(&rec.cid()).await? {
            self.metrics.inc_deduped();
            tracing::debug!(thread = %tid, log = %lid, cid = %rec.cid(), "record already known");
            return Ok(wire::PushRecordReply::default());
        }

        let mut reply = wire::PushRecordReply::default();
        let mut own_log = None;

        // Check if this log already exists
        match self.directory.pub_key(tid, lid).await? {
            Some(log_pk) => {
                rec.verify(&log_pk)?;
                match self.handle_log_update(tid, lid, &rec).await {
                    Ok(true) => tracing::info!(thread = %tid, log = %lid, "log updated"),
                    Ok(false) => {}
                    Err(e) => {
                        // The record is still admitted; the counter is the
                        // only trace of the dropped membership update.
                        self.metrics.inc_log_update_errors();
                        tracing::warn!(thread = %tid, log = %lid, error = %e, "log update failed");
                    }
                }
            }
            None => {
                let kid = header
                    .read_key_log_id
                    .as_deref()
                    .map(LogId::try_from)
                    .transpose()
                    .map_err(|_| WeftNetError::Protocol("invalid read key log id".into()))?;
                let (minted, new_addr) = self.handle_new_logs(tid, lid, kid, &rec).await?;
                if let Some(addr) = &new_addr {
                    reply.new_addr = Some(addr.to_string());
                }
                own_log = minted;
            }
        }

        self.store.put_record(tid, lid, &rec).await?;
        self.metrics.inc_admitted();

        if let Some(lg) = own_log {
            // Notify existing logs of our new log. Recipients already host
            // the thread, so their admission takes the known-log branch and
            // the advertisement does not recurse further.
            let doc = Logs::new(vec![lg.public_view()], true);
            self.add_record(
                tid,
                doc.to_borsh(),
                AddSettings {
                    key_log: Some(lid),
                    ..Default::default()
                },
            )
            .await?;
        }

        Ok(reply)
    }

    /// Serve a PullRecords request: up to `limit` local records following
    /// `offset` (exclusive) in chain order. An absent offset means the
    /// beginning of the chain.
    pub async fn pull_records(
        &self,
        req: &wire::PullRecordsRequest,
    ) -> Result<wire::PullRecordsReply, WeftNetError> {
        let tid = ThreadId::from_slice(&req.thread_id).map_err(WeftNetError::Protocol)?;
        let lid = LogId::try_from(req.log_id.as_slice())
            .map_err(|_| WeftNetError::Protocol("invalid log id".into()))?;
        let offset = req
            .offset
            .as_deref()
            .map(Cid::try_from)
            .transpose()
            .map_err(|_| WeftNetError::Protocol("invalid offset".into()))?;
        let limit = req.limit.max(0) as usize;

        let recs = self.store.records_after(tid, lid, offset, limit).await?;
        Ok(wire::PullRecordsReply {
            records: recs.iter().map(record_to_proto).collect(),
        })
    }

    /// Look up a log's signing public key. Exposed for the out-of-line
    /// advertisement helper in [`crate::advertise`].
    pub(crate) async fn directory_pub_key(
        &self,
        thread: ThreadId,
        log: LogId,
    ) -> Result<Option<PubKey>, WeftNetError> {
        Ok(self.directory.pub_key(thread, log).await?)
    }

    // ==================== Local writes ====================

    /// Write a record on this peer's own log and replicate it out.
    ///
    /// The event body is sealed under the key log's read key, or to a peer
    /// host key for invites. The record chains on the own log's current
    /// head, persists locally, and only then fans out — a broadcast record
    /// is always locally persisted first.
    pub fn add_record(
        self: &Arc<Self>,
        thread: ThreadId,
        body: Vec<u8>,
        settings: AddSettings,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Record, WeftNetError>> + Send>>
    {
        let this = self.clone();
        Box::pin(async move {
            let own = this.own_log(thread).await?.ok_or(WeftNetError::NoOwnLog)?;
            let signing_key = own.priv_key.clone().ok_or(WeftNetError::NoOwnLog)?;
            let follow_key = own.follow_key.ok_or(WeftNetError::FollowKeyNotFound)?;

            let sealed_body = match settings.seal_to {
                Some(peer) => {
                    let pk = peer
                        .extract_public_key()
                        .map_err(|e| WeftNetError::Signer(e.to_string()))?;
                    crypto::seal_to(&pk, &body)?
                }
                None => {
                    let key_log = settings.key_log.unwrap_or(own.id);
                    let read_key = this
                        .directory
                        .read_key(thread, key_log)
                        .await?
                        .ok_or(WeftNetError::ReadKeyNotFound)?;
                    crypto::seal_sym(&read_key, &body)?
                }
            };

            let prev = this.directory.heads(thread, own.id).await?.first().copied();
            let rec = Record::seal(sealed_body, &follow_key, &signing_key, prev, now_millis())?;

            this.store.put_record(thread, own.id, &rec).await?;
            this.broadcast_record(thread, own.id, &rec, &settings).await?;
            Ok(rec)
        })
    }

    /// Subscribe to a thread's topic, spawning its subscription loop.
    /// A no-op when the thread is already subscribed.
    pub async fn subscribe(self: &Arc<Self>, thread: ThreadId) -> Result<(), WeftNetError> {
        {
            let tokens = self.thread_tokens.lock().await;
            if tokens.contains_key(&thread) {
                return Ok(());
            }
        }
        let rx = self.gossip.subscribe(thread, Vec::new()).await?;
        let token = self.cancel.child_token();
        self.thread_tokens
            .lock()
            .await
            .insert(thread, token.clone());
        tokio::spawn(subscriber::run(self.clone(), thread, rx, token));
        tracing::info!(thread = %thread, "subscribed to thread topic");
        Ok(())
    }

    // ==================== Merge handlers ====================

    /// Process a record on a known log as a membership update.
    ///
    /// Returns Ok(false) when no read key is held (nothing to decode),
    /// Ok(true) when an update was applied. Only entries for the record's
    /// own log are applied; a record cannot update someone else's log.
    async fn handle_log_update(
        &self,
        thread: ThreadId,
        log: LogId,
        rec: &Record,
    ) -> Result<bool, WeftNetError> {
        let Some(read_key) = self.directory.read_key(thread, log).await? else {
            return Ok(false); // No key, carry on
        };
        let body = rec.open_body(&CipherKey::Sym(read_key))?;
        let doc = Logs::from_borsh(&body)
            .map_err(|e| WeftNetError::Protocol(format!("invalid membership document: {}", e)))?;

        for lg in doc.logs() {
            if !lg.id.matches(&lg.pub_key) {
                return Err(WeftNetError::InvalidLog);
            }
            if lg.id != log {
                continue; // We only want updates from the owner
            }
            rec.verify(&lg.pub_key)?;
            self.directory.add_log(thread, lg.clone()).await?;
        }
        Ok(true)
    }

    /// Process a record for a log we hold no public key for — the bootstrap
    /// path. Decodes the event body as a membership document, ingests every
    /// descriptor, and decides this peer's role:
    /// - readable document on a brand-new thread: mint an own log, returned
    ///   for advertisement;
    /// - non-readable document: register `/p2p/<self>` as a permanent
    ///   address of the sender's log and return it — this peer is now a
    ///   follower.
    async fn handle_new_logs(
        self: &Arc<Self>,
        thread: ThreadId,
        log: LogId,
        key_log: Option<LogId>,
        rec: &Record,
    ) -> Result<(Option<LogInfo>, Option<PeerAddr>), WeftNetError> {
        let info = self.directory.thread_info(thread).await?;
        let new_thread = info.logs.is_empty();

        let key = if new_thread {
            // Thread does not exist here — try the host key.
            self.identity.decryption_key()
        } else {
            // Thread exists — there should be a key log id.
            let kid = key_log.ok_or(WeftNetError::ReadKeyNotFound)?;
            let read_key = self
                .directory
                .read_key(thread, kid)
                .await?
                .ok_or(WeftNetError::ReadKeyNotFound)?;
            CipherKey::Sym(read_key)
        };

        let body = rec.open_body(&key)?;
        let doc = Logs::from_borsh(&body)
            .map_err(|e| WeftNetError::Protocol(format!("invalid membership document: {}", e)))?;

        // Add incoming logs
        for lg in doc.logs() {
            if !lg.id.matches(&lg.pub_key) {
                return Err(WeftNetError::InvalidLog);
            }
            if lg.id == log {
                // This is the log carrying the event
                rec.verify(&lg.pub_key)?;
            }
            self.directory.add_log(thread, lg.clone()).await?;
            self.spawn_history_pull(thread, lg.id);
        }

        // Create an own log if this is a new thread we can read.
        let mut own_log = None;
        if doc.readable() && new_thread {
            let lg = LogInfo::generate(PeerAddr::new(self.identity.peer_id()));
            self.directory.add_log(thread, lg.clone()).await?;
            own_log = Some(lg);
        }

        // If not readable, return a new address for the sender's log.
        // This peer becomes a follower.
        let mut new_addr = None;
        if !doc.readable() {
            let addr = PeerAddr::new(self.identity.peer_id());
            self.directory
                .add_addr(thread, log, addr, AddrTtl::Permanent)
                .await?;
            new_addr = Some(addr);
        }

        // Subscribe to the new thread
        if new_thread {
            self.subscribe(thread).await?;
        }

        Ok((own_log, new_addr))
    }

    /// Detached history download for one log, bounded by the configured
    /// deadline. Failures are logged and counted, never raised.
    fn spawn_history_pull(self: &Arc<Self>, thread: ThreadId, log: LogId) {
        let service = self.clone();
        let deadline = self.config.history_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(deadline, service.pull_history(thread, log)).await {
                Ok(Ok(n)) => {
                    tracing::debug!(thread = %thread, log = %log, records = n, "history pull complete")
                }
                Ok(Err(e)) => {
                    service.metrics.inc_history_pull_failures();
                    tracing::warn!(thread = %thread, log = %log, error = %e, "history pull failed");
                }
                Err(_) => {
                    service.metrics.inc_history_pull_failures();
                    tracing::warn!(thread = %thread, log = %log, "history pull timed out");
                }
            }
        });
    }

    // ==================== Wire operations (client side) ====================

    /// Pull a log's entire history from every known address and persist the
    /// union locally.
    pub async fn pull_history(&self, thread: ThreadId, log: LogId) -> Result<usize, WeftNetError> {
        let recs = self
            .fetch_records(thread, log, None, self.config.max_pull_limit)
            .await?;
        let n = recs.len();
        for rec in recs {
            self.store.put_record(thread, log, &rec).await?;
        }
        Ok(n)
    }

    /// Pull records for a log from every known address in parallel,
    /// deduplicated by cid. Addresses equal to the local peer are skipped;
    /// individual address failures are logged, never raised.
    pub async fn fetch_records(
        &self,
        thread: ThreadId,
        log: LogId,
        offset: Option<Cid>,
        limit: usize,
    ) -> Result<Vec<Record>, WeftNetError> {
        let lg = self
            .directory
            .log_info(thread, log)
            .await?
            .ok_or(WeftNetError::LogNotFound)?;
        let follow_key = lg.follow_key.ok_or(WeftNetError::FollowKeyNotFound)?;

        let req = wire::PullRecordsRequest {
            header: Some(self.plain_header()),
            thread_id: thread.as_bytes().to_vec(),
            log_id: log.as_bytes().to_vec(),
            offset: offset.map(|c| c.as_bytes().to_vec()),
            limit: limit as i32,
        };

        let recs = RecordSet::default();
        let pulls = lg.addrs.iter().map(|addr| {
            let req = req.clone();
            let recs = &recs;
            let peer = addr.peer_id();
            async move {
                if peer == self.identity.peer_id() {
                    return;
                }
                tracing::debug!(thread = %thread, log = %log, peer = %peer, "pulling records");
                let outcome = tokio::time::timeout(
                    self.config.req_timeout,
                    self.request(peer, thread_message::Message::PullRecordsRequest(req)),
                )
                .await;
                let reply = match outcome {
                    Ok(Ok(thread_message::Message::PullRecordsReply(reply))) => reply,
                    Ok(Ok(_)) => {
                        tracing::error!(peer = %peer, "unexpected pull reply");
                        return;
                    }
                    Ok(Err(e)) => {
                        tracing::error!(peer = %peer, error = %e, "pull failed");
                        return;
                    }
                    Err(_) => {
                        tracing::error!(peer = %peer, "pull timed out");
                        return;
                    }
                };
                tracing::debug!(records = reply.records.len(), peer = %peer, "received records");
                for proto in &reply.records {
                    match record_from_proto(proto, &follow_key) {
                        Ok(rec) => recs.store(rec),
                        Err(e) => {
                            tracing::error!(peer = %peer, error = %e, "invalid pulled record")
                        }
                    }
                }
            }
        });
        futures_util::future::join_all(pulls).await;

        Ok(recs.list())
    }

    /// Fetch every log a peer knows for a thread.
    pub async fn fetch_logs(
        &self,
        peer: PeerId,
        thread: ThreadId,
    ) -> Result<Vec<LogInfo>, WeftNetError> {
        let req = wire::GetLogsRequest {
            header: Some(self.plain_header()),
            thread_id: thread.as_bytes().to_vec(),
        };
        tracing::debug!(thread = %thread, peer = %peer, "getting thread logs");
        let reply = tokio::time::timeout(
            self.config.req_timeout,
            self.request(peer, thread_message::Message::GetLogsRequest(req)),
        )
        .await
        .map_err(|_| WeftNetError::Connection("request timed out".into()))??;
        match reply {
            thread_message::Message::GetLogsReply(reply) => {
                tracing::debug!(logs = reply.logs.len(), peer = %peer, "received logs");
                reply
                    .logs
                    .iter()
                    .map(|lg| log_from_proto(lg).map_err(WeftNetError::Protocol))
                    .collect()
            }
            _ => Err(WeftNetError::Protocol("unexpected get logs reply".into())),
        }
    }

    // ==================== Outbound fan-out ====================

    /// Push a record to every known writer address and the thread topic.
    ///
    /// One task per address, each bounded by the request timeout; the topic
    /// publish runs in parallel and happens at most once, and only when the
    /// follow key was resolvable. Waits for the barrier before returning;
    /// individual address failures are logged and counted, never raised.
    pub(crate) async fn broadcast_record(
        self: &Arc<Self>,
        thread: ThreadId,
        log: LogId,
        rec: &Record,
        settings: &AddSettings,
    ) -> Result<(), WeftNetError> {
        // Collect known writers
        let info = self.directory.thread_info(thread).await?;
        let mut addrs: Vec<PeerAddr> = Vec::new();
        for lid in info.logs {
            if lid == log {
                continue;
            }
            for addr in self.directory.addrs(thread, lid).await? {
                if !addrs.contains(&addr) {
                    addrs.push(addr);
                }
            }
        }
        // Add additional addresses
        for addr in &settings.addrs {
            if !addrs.contains(addr) {
                addrs.push(*addr);
            }
        }

        // Serialize and sign the record for transport
        let rec_proto = record_to_proto(rec);
        let payload = rec_proto.encode_to_vec();
        let sig = self.identity.sign(&payload);

        let key_log = settings.key_log.unwrap_or(log);
        let read_key_log = if self.directory.read_key(thread, key_log).await?.is_some() {
            Some(key_log)
        } else {
            None
        };
        let follow_key = self.directory.follow_key(thread, log).await?;

        let req = wire::PushRecordRequest {
            header: Some(wire::Header {
                from: self.identity.peer_id().as_bytes().to_vec(),
                signature: sig.as_bytes().to_vec(),
                key: Some(self.identity.public_key().as_bytes().to_vec()),
                follow_key: follow_key.map(|k| k.as_bytes().to_vec()),
                read_key_log_id: read_key_log.map(|l| l.as_bytes().to_vec()),
            }),
            thread_id: thread.as_bytes().to_vec(),
            log_id: log.as_bytes().to_vec(),
            record: Some(rec_proto),
        };

        // Push to each address, and publish to the thread's topic in
        // parallel with the point-to-point pushes.
        let pushes = addrs.iter().map(|addr| self.push_to_addr(thread, log, *addr, &req));
        let publish = async {
            if follow_key.is_some() {
                let msg = wire::ThreadMessage {
                    message: Some(thread_message::Message::PushRecordRequest(req.clone())),
                };
                if let Err(e) = self.gossip.broadcast(thread, msg.encode_to_vec()).await {
                    tracing::error!(thread = %thread, error = %e, "topic publish failed");
                }
            } else {
                tracing::debug!(thread = %thread, log = %log, "no follow key, skipping topic publish");
            }
        };
        let _ = tokio::join!(futures_util::future::join_all(pushes), publish);

        Ok(())
    }

    /// One point-to-point push. On a `new_addr` reply, record the address
    /// and advertise it to the other writers in a background task.
    async fn push_to_addr(
        self: &Arc<Self>,
        thread: ThreadId,
        log: LogId,
        addr: PeerAddr,
        req: &wire::PushRecordRequest,
    ) {
        let peer = addr.peer_id();
        tracing::debug!(thread = %thread, peer = %peer, "pushing record");

        let outcome = tokio::time::timeout(
            self.config.req_timeout,
            self.request(peer, thread_message::Message::PushRecordRequest(req.clone())),
        )
        .await;
        let reply = match outcome {
            Ok(Ok(thread_message::Message::PushRecordReply(reply))) => reply,
            Ok(Ok(_)) => {
                self.metrics.inc_fanout_failures();
                tracing::error!(peer = %peer, "unexpected push reply");
                return;
            }
            Ok(Err(e)) => {
                self.metrics.inc_fanout_failures();
                tracing::error!(peer = %peer, error = %e, "push failed");
                return;
            }
            Err(_) => {
                self.metrics.inc_fanout_failures();
                tracing::error!(peer = %peer, "push timed out");
                return;
            }
        };
        tracing::debug!(peer = %peer, "received push reply");

        // Handle new log addresses
        let Some(new_addr) = reply.new_addr else {
            return;
        };
        let parsed: PeerAddr = match new_addr.parse() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::error!(peer = %peer, error = %e, "bad address in push reply");
                return;
            }
        };
        if let Err(e) = self
            .directory
            .add_addr(thread, log, parsed, AddrTtl::Permanent)
            .await
        {
            tracing::error!(error = %e, "recording follower address failed");
            return;
        }
        tracing::debug!(thread = %thread, log = %log, addr = %parsed, "peer follows the log");

        // Notify others
        let service = self.clone();
        tokio::spawn(async move {
            crate::advertise::advertise_log(service, thread, log, parsed).await;
        });
    }

    // ==================== Internals ====================

    /// One request/reply exchange with a peer over a fresh stream.
    async fn request(
        &self,
        peer: PeerId,
        msg: thread_message::Message,
    ) -> Result<thread_message::Message, WeftNetError> {
        let (mut sink, mut stream) = self.dial(peer).await?;
        sink.send(&wire::ThreadMessage { message: Some(msg) }).await?;
        let reply = stream
            .recv()
            .await?
            .ok_or_else(|| WeftNetError::Connection("peer closed stream".into()))?;
        match reply.message {
            Some(thread_message::Message::ErrorReply(e)) => Err(WeftNetError::Remote(e.error)),
            Some(msg) => Ok(msg),
            None => Err(WeftNetError::Protocol("empty reply".into())),
        }
    }

    /// Open a framed stream to a peer over the thread protocol.
    async fn dial(
        &self,
        peer: PeerId,
    ) -> Result<(MessageSink<SendHalf<T>>, MessageStream<RecvHalf<T>>), WeftNetError> {
        let pk = peer
            .extract_public_key()
            .map_err(|e| WeftNetError::Signer(e.to_string()))?;
        let conn = self
            .transport
            .connect(&pk)
            .await
            .map_err(|e| WeftNetError::Connection(e.to_string()))?;
        let bi = conn
            .open_bi()
            .await
            .map_err(|e| WeftNetError::Connection(e.to_string()))?;
        let (send, recv) = bi.into_split();
        Ok((MessageSink::new(send), MessageStream::new(recv)))
    }

    /// Header for unauthenticated requests (GetLogs, PullRecords).
    fn plain_header(&self) -> wire::Header {
        wire::Header {
            from: self.identity.peer_id().as_bytes().to_vec(),
            ..Default::default()
        }
    }

    /// The log this peer writes for a thread, if it holds one.
    async fn own_log(&self, thread: ThreadId) -> Result<Option<LogInfo>, WeftNetError> {
        let info = self.directory.thread_info(thread).await?;
        for lid in info.logs {
            if let Some(lg) = self.directory.log_info(thread, lid).await? {
                if lg.priv_key.is_some() {
                    return Ok(Some(lg));
                }
            }
        }
        Ok(None)
    }

    /// Per-thread admission lock.
    async fn admit_lock(&self, thread: ThreadId) -> Arc<Mutex<()>> {
        let mut locks = self.admit_locks.lock().await;
        locks
            .entry(thread)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Resolve the signer key of a push request: an attached key must match the
/// sender id, otherwise the key must be extractable from the id itself.
fn request_pub_key(header: &wire::Header) -> Result<PubKey, WeftNetError> {
    let from = PeerId::try_from(header.from.as_slice())
        .map_err(|_| WeftNetError::Signer("invalid sender id".into()))?;
    match &header.key {
        None => {
            // No attached key, it must be extractable from the source id
            from.extract_public_key()
                .map_err(|e| WeftNetError::Signer(format!("cannot extract signing key: {}", e)))
        }
        Some(key) => {
            let pk = PubKey::try_from(key.as_slice())
                .map_err(|_| WeftNetError::Signer("invalid signing key".into()))?;
            // Verify that the source id matches the attached key
            if !from.matches(&pk) {
                return Err(WeftNetError::Signer(format!(
                    "source id {} does not match attached key",
                    from
                )));
            }
            Ok(pk)
        }
    }
}

/// Verify the transport signature over the canonical record bytes.
fn verify_request_signature(
    rec: &wire::Record,
    pk: &PubKey,
    sig: &[u8],
) -> Result<(), WeftNetError> {
    let payload = rec.encode_to_vec();
    let sig = Signature::try_from(sig).map_err(|_| WeftNetError::BadSignature)?;
    crypto::verify(pk, &payload, &sig).map_err(|_| WeftNetError::BadSignature)
}

/// Wall-clock milliseconds for record stamping.
fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Maintains an ordered set of records aggregated from multiple sources,
/// deduplicated by cid. Writers hold the lock only to check-and-insert;
/// readers only to snapshot the ordered list.
#[derive(Default)]
struct RecordSet {
    inner: std::sync::RwLock<RecordSetInner>,
}

#[derive(Default)]
struct RecordSetInner {
    seen: std::collections::HashSet<Cid>,
    ordered: Vec<Record>,
}

impl RecordSet {
    /// Store a record unless its cid was already seen.
    fn store(&self, rec: Record) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if inner.seen.insert(rec.cid()) {
            inner.ordered.push(rec);
        }
    }

    /// Snapshot all records in insertion order.
    fn list(&self) -> Vec<Record> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_model::crypto::generate_sym_key;

    #[test]
    fn request_pub_key_extracts_from_sender_id() {
        let identity = Identity::generate();
        let header = wire::Header {
            from: identity.peer_id().as_bytes().to_vec(),
            ..Default::default()
        };
        assert_eq!(request_pub_key(&header).unwrap(), identity.public_key());
    }

    #[test]
    fn request_pub_key_rejects_mismatched_key() {
        let identity = Identity::generate();
        let other = Identity::generate();
        let header = wire::Header {
            from: identity.peer_id().as_bytes().to_vec(),
            key: Some(other.public_key().as_bytes().to_vec()),
            ..Default::default()
        };
        assert!(matches!(
            request_pub_key(&header),
            Err(WeftNetError::Signer(_))
        ));
    }

    #[test]
    fn request_pub_key_accepts_matching_key() {
        let identity = Identity::generate();
        let header = wire::Header {
            from: identity.peer_id().as_bytes().to_vec(),
            key: Some(identity.public_key().as_bytes().to_vec()),
            ..Default::default()
        };
        assert_eq!(request_pub_key(&header).unwrap(), identity.public_key());
    }

    #[test]
    fn request_signature_verifies_canonical_bytes() {
        let identity = Identity::generate();
        let sk = ed25519_dalek::SigningKey::from_bytes(&[4u8; 32]);
        let follow = generate_sym_key();
        let rec = Record::seal(b"body".to_vec(), &follow, &sk, None, 0).unwrap();
        let proto = record_to_proto(&rec);
        let sig = identity.sign(&proto.encode_to_vec());
        assert!(
            verify_request_signature(&proto, &identity.public_key(), sig.as_bytes()).is_ok()
        );
        assert!(verify_request_signature(
            &proto,
            &Identity::generate().public_key(),
            sig.as_bytes()
        )
        .is_err());
    }

    #[test]
    fn record_set_deduplicates_and_preserves_order() {
        let sk = ed25519_dalek::SigningKey::from_bytes(&[1u8; 32]);
        let follow = generate_sym_key();
        let first = Record::seal(b"one".to_vec(), &follow, &sk, None, 1).unwrap();
        let second = Record::seal(b"two".to_vec(), &follow, &sk, Some(first.cid()), 2).unwrap();

        let set = RecordSet::default();
        set.store(first.clone());
        set.store(second.clone());
        set.store(first.clone());

        let listed = set.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].cid(), first.cid());
        assert_eq!(listed[1].cid(), second.cid());
    }
}
