//! Store seams consumed by the replication service
//!
//! The log directory ([`LogStore`]) and the block store with its owning
//! component's PutRecord ([`RecordStore`]) are external, thread-safe
//! collaborators. The replication core only consumes these operations; it
//! never owns the data.

use weft_model::{AddrTtl, Cid, LogId, LogInfo, PeerAddr, PubKey, Record, SymKey, ThreadId, ThreadInfo};

/// Directory / block store failure.
#[derive(Debug, thiserror::Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The log directory: (thread, log) → descriptor.
///
/// `add_log` is an upsert: key material and addresses merge into an
/// existing descriptor, and known keys are never downgraded to unknown.
#[async_trait::async_trait]
pub trait LogStore: Send + Sync + 'static {
    /// Every thread this peer participates in.
    async fn threads(&self) -> Result<Vec<ThreadId>, StoreError>;

    /// Summary of a thread's logs. Empty for unknown threads.
    async fn thread_info(&self, thread: ThreadId) -> Result<ThreadInfo, StoreError>;

    /// Full descriptor of one log, if known.
    async fn log_info(&self, thread: ThreadId, log: LogId) -> Result<Option<LogInfo>, StoreError>;

    /// The log's signing public key, if known.
    async fn pub_key(&self, thread: ThreadId, log: LogId) -> Result<Option<PubKey>, StoreError>;

    /// The log's envelope key, if held.
    async fn follow_key(&self, thread: ThreadId, log: LogId) -> Result<Option<SymKey>, StoreError>;

    /// The log's event body key, if held.
    async fn read_key(&self, thread: ThreadId, log: LogId) -> Result<Option<SymKey>, StoreError>;

    /// Addresses the log is reachable through.
    async fn addrs(&self, thread: ThreadId, log: LogId) -> Result<Vec<PeerAddr>, StoreError>;

    /// Current chain tips of the log.
    async fn heads(&self, thread: ThreadId, log: LogId) -> Result<Vec<Cid>, StoreError>;

    /// Upsert a log descriptor into the thread.
    async fn add_log(&self, thread: ThreadId, log: LogInfo) -> Result<(), StoreError>;

    /// Record an address for a log.
    async fn add_addr(
        &self,
        thread: ThreadId,
        log: LogId,
        addr: PeerAddr,
        ttl: AddrTtl,
    ) -> Result<(), StoreError>;
}

/// The block store plus the owning component's PutRecord.
///
/// Records are keyed by content id; `put_record` persists the block and
/// advances the log's heads, and admitting the same record twice is a
/// no-op.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Whether a record with this cid is already persisted.
    async fn has(&self, cid: &Cid) -> Result<bool, StoreError>;

    /// Persist a record on a log and advance the log's heads.
    async fn put_record(
        &self,
        thread: ThreadId,
        log: LogId,
        rec: &Record,
    ) -> Result<(), StoreError>;

    /// Read up to `limit` records following `offset` (exclusive) in chain
    /// order. `None` means "from the beginning of the chain".
    async fn records_after(
        &self,
        thread: ThreadId,
        log: LogId,
        offset: Option<Cid>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;
}
