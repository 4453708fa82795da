//! In-memory directory and record store
//!
//! [`MemThreadStore`] implements both [`LogStore`] (the (thread, log) →
//! descriptor directory) and [`RecordStore`] (the cid-keyed block store with
//! head tracking). It is the backing store for tests and simulation
//! harnesses; persistent implementations plug in behind the same traits.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use weft_model::{
    AddrTtl, Cid, LogId, LogInfo, PeerAddr, PubKey, Record, SymKey, ThreadId, ThreadInfo,
};
use weft_net_types::{LogStore, RecordStore, StoreError};

/// Per-log chain bookkeeping: which cids belong to the log, which are
/// referenced as a predecessor, and the insertion order for stable head
/// selection.
#[derive(Default)]
struct Chain {
    members: Vec<Cid>,
    member_set: HashSet<Cid>,
    prevs: HashSet<Cid>,
}

impl Chain {
    /// Chain tips: members no other member points at, newest first.
    fn heads(&self) -> Vec<Cid> {
        self.members
            .iter()
            .rev()
            .filter(|c| !self.prevs.contains(c))
            .copied()
            .collect()
    }
}

/// In-memory implementation of the directory and block store seams.
#[derive(Default)]
pub struct MemThreadStore {
    dir: RwLock<HashMap<ThreadId, HashMap<LogId, LogInfo>>>,
    blocks: RwLock<HashMap<Cid, Record>>,
    chains: RwLock<HashMap<(ThreadId, LogId), Chain>>,
}

impl MemThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an incoming descriptor into an existing one. Known key material
    /// is never downgraded; addresses union in order; heads replace when the
    /// incoming descriptor carries any.
    fn merge_log(existing: &mut LogInfo, incoming: LogInfo) {
        if existing.follow_key.is_none() {
            existing.follow_key = incoming.follow_key;
        }
        if existing.read_key.is_none() {
            existing.read_key = incoming.read_key;
        }
        if existing.priv_key.is_none() {
            existing.priv_key = incoming.priv_key;
        }
        for addr in incoming.addrs {
            if !existing.addrs.contains(&addr) {
                existing.addrs.push(addr);
            }
        }
        if !incoming.heads.is_empty() {
            existing.heads = incoming.heads;
        }
    }

    async fn with_log<R>(
        &self,
        thread: ThreadId,
        log: LogId,
        f: impl FnOnce(&LogInfo) -> R,
    ) -> Result<Option<R>, StoreError> {
        let dir = self.dir.read().await;
        Ok(dir.get(&thread).and_then(|logs| logs.get(&log)).map(f))
    }
}

#[async_trait::async_trait]
impl LogStore for MemThreadStore {
    async fn threads(&self) -> Result<Vec<ThreadId>, StoreError> {
        let dir = self.dir.read().await;
        let mut ids: Vec<ThreadId> = dir.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn thread_info(&self, thread: ThreadId) -> Result<ThreadInfo, StoreError> {
        let dir = self.dir.read().await;
        let mut logs: Vec<LogId> = dir
            .get(&thread)
            .map(|logs| logs.keys().copied().collect())
            .unwrap_or_default();
        logs.sort();
        Ok(ThreadInfo::new(logs))
    }

    async fn log_info(&self, thread: ThreadId, log: LogId) -> Result<Option<LogInfo>, StoreError> {
        self.with_log(thread, log, |lg| lg.clone()).await
    }

    async fn pub_key(&self, thread: ThreadId, log: LogId) -> Result<Option<PubKey>, StoreError> {
        self.with_log(thread, log, |lg| lg.pub_key).await
    }

    async fn follow_key(&self, thread: ThreadId, log: LogId) -> Result<Option<SymKey>, StoreError> {
        Ok(self.with_log(thread, log, |lg| lg.follow_key).await?.flatten())
    }

    async fn read_key(&self, thread: ThreadId, log: LogId) -> Result<Option<SymKey>, StoreError> {
        Ok(self.with_log(thread, log, |lg| lg.read_key).await?.flatten())
    }

    async fn addrs(&self, thread: ThreadId, log: LogId) -> Result<Vec<PeerAddr>, StoreError> {
        Ok(self
            .with_log(thread, log, |lg| lg.addrs.clone())
            .await?
            .unwrap_or_default())
    }

    async fn heads(&self, thread: ThreadId, log: LogId) -> Result<Vec<Cid>, StoreError> {
        let chains = self.chains.read().await;
        if let Some(chain) = chains.get(&(thread, log)) {
            let heads = chain.heads();
            if !heads.is_empty() {
                return Ok(heads);
            }
        }
        drop(chains);
        // No local records yet; fall back to the advertised tips.
        Ok(self
            .with_log(thread, log, |lg| lg.heads.clone())
            .await?
            .unwrap_or_default())
    }

    async fn add_log(&self, thread: ThreadId, log: LogInfo) -> Result<(), StoreError> {
        let mut dir = self.dir.write().await;
        let logs = dir.entry(thread).or_default();
        match logs.get_mut(&log.id) {
            Some(existing) => Self::merge_log(existing, log),
            None => {
                logs.insert(log.id, log);
            }
        }
        Ok(())
    }

    async fn add_addr(
        &self,
        thread: ThreadId,
        log: LogId,
        addr: PeerAddr,
        _ttl: AddrTtl,
    ) -> Result<(), StoreError> {
        let mut dir = self.dir.write().await;
        let lg = dir
            .get_mut(&thread)
            .and_then(|logs| logs.get_mut(&log))
            .ok_or_else(|| StoreError::new(format!("log {} not found in thread {}", log, thread)))?;
        if !lg.addrs.contains(&addr) {
            lg.addrs.push(addr);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for MemThreadStore {
    async fn has(&self, cid: &Cid) -> Result<bool, StoreError> {
        Ok(self.blocks.read().await.contains_key(cid))
    }

    async fn put_record(
        &self,
        thread: ThreadId,
        log: LogId,
        rec: &Record,
    ) -> Result<(), StoreError> {
        let cid = rec.cid();
        let mut blocks = self.blocks.write().await;
        if blocks.contains_key(&cid) {
            return Ok(());
        }
        blocks.insert(cid, rec.clone());
        drop(blocks);

        let mut chains = self.chains.write().await;
        let chain = chains.entry((thread, log)).or_default();
        if chain.member_set.insert(cid) {
            chain.members.push(cid);
        }
        if let Some(prev) = rec.prev() {
            chain.prevs.insert(prev);
        }
        Ok(())
    }

    async fn records_after(
        &self,
        thread: ThreadId,
        log: LogId,
        offset: Option<Cid>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let chains = self.chains.read().await;
        let Some(chain) = chains.get(&(thread, log)) else {
            return Ok(Vec::new());
        };
        let heads = chain.heads();
        drop(chains);

        let blocks = self.blocks.read().await;
        // Walk back from each tip until the offset (exclusive) or a missing
        // predecessor; serve the longest walk. A fully replicated log has a
        // single tip and this is just the chain.
        let mut best: Vec<Record> = Vec::new();
        for head in heads {
            let mut walk: Vec<Record> = Vec::new();
            let mut cursor = Some(head);
            while let Some(cid) = cursor {
                if Some(cid) == offset {
                    break;
                }
                let Some(rec) = blocks.get(&cid) else { break };
                cursor = rec.prev();
                walk.push(rec.clone());
            }
            if walk.len() > best.len() {
                best = walk;
            }
        }
        best.reverse();
        best.truncate(limit);
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use weft_model::crypto::generate_sym_key;
    use weft_model::{PeerAddr, PeerId, SymKey};

    fn addr(byte: u8) -> PeerAddr {
        PeerAddr::new(PeerId([byte; 32]))
    }

    fn chain_of(n: usize, sk: &SigningKey, follow: &SymKey) -> Vec<Record> {
        let mut out: Vec<Record> = Vec::new();
        for i in 0..n {
            let prev = out.last().map(|r| r.cid());
            let rec = Record::seal(
                format!("body-{}", i).into_bytes(),
                follow,
                sk,
                prev,
                i as u64,
            )
            .unwrap();
            out.push(rec);
        }
        out
    }

    #[tokio::test]
    async fn add_log_merges_without_downgrading() {
        let store = MemThreadStore::new();
        let tid = ThreadId::new_random();
        let full = LogInfo::generate(addr(1));
        let lid = full.id;
        store.add_log(tid, full.clone()).await.unwrap();

        // A later descriptor without keys must not erase the known ones.
        let mut partial = full.public_view();
        partial.follow_key = None;
        partial.read_key = None;
        partial.addrs = vec![addr(2)];
        store.add_log(tid, partial).await.unwrap();

        let merged = store.log_info(tid, lid).await.unwrap().unwrap();
        assert_eq!(merged.follow_key, full.follow_key);
        assert_eq!(merged.read_key, full.read_key);
        assert!(merged.priv_key.is_some());
        assert_eq!(merged.addrs, vec![addr(1), addr(2)]);
    }

    #[tokio::test]
    async fn add_addr_requires_known_log() {
        let store = MemThreadStore::new();
        let tid = ThreadId::new_random();
        let err = store
            .add_addr(tid, LogId::from_public_key(&PubKey([1; 32])), addr(1), AddrTtl::Permanent)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn put_record_is_idempotent() {
        let store = MemThreadStore::new();
        let tid = ThreadId::new_random();
        let sk = SigningKey::from_bytes(&[1u8; 32]);
        let follow = generate_sym_key();
        let lid = LogId::from_public_key(&PubKey(sk.verifying_key().to_bytes()));
        let rec = chain_of(1, &sk, &follow).pop().unwrap();

        store.put_record(tid, lid, &rec).await.unwrap();
        store.put_record(tid, lid, &rec).await.unwrap();

        let recs = store.records_after(tid, lid, None, 100).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert!(store.has(&rec.cid()).await.unwrap());
    }

    #[tokio::test]
    async fn records_after_boundaries() {
        let store = MemThreadStore::new();
        let tid = ThreadId::new_random();
        let sk = SigningKey::from_bytes(&[2u8; 32]);
        let follow = generate_sym_key();
        let lid = LogId::from_public_key(&PubKey(sk.verifying_key().to_bytes()));
        let chain = chain_of(5, &sk, &follow);
        for rec in &chain {
            store.put_record(tid, lid, rec).await.unwrap();
        }

        // limit 0 → empty
        assert!(store.records_after(tid, lid, None, 0).await.unwrap().is_empty());

        // offset None → from the beginning, chain order
        let all = store.records_after(tid, lid, None, 100).await.unwrap();
        assert_eq!(
            all.iter().map(|r| r.cid()).collect::<Vec<_>>(),
            chain.iter().map(|r| r.cid()).collect::<Vec<_>>()
        );

        // offset exclusive
        let tail = store
            .records_after(tid, lid, Some(chain[1].cid()), 100)
            .await
            .unwrap();
        assert_eq!(
            tail.iter().map(|r| r.cid()).collect::<Vec<_>>(),
            chain[2..].iter().map(|r| r.cid()).collect::<Vec<_>>()
        );

        // limit truncates from the oldest side
        let first_two = store.records_after(tid, lid, None, 2).await.unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[0].cid(), chain[0].cid());
    }

    #[tokio::test]
    async fn heads_advance_with_the_chain() {
        let store = MemThreadStore::new();
        let tid = ThreadId::new_random();
        let sk = SigningKey::from_bytes(&[3u8; 32]);
        let follow = generate_sym_key();
        let pub_key = PubKey(sk.verifying_key().to_bytes());
        let lid = LogId::from_public_key(&pub_key);

        let mut lg = LogInfo::generate(addr(1));
        lg.id = lid;
        lg.pub_key = pub_key;
        lg.heads = vec![Cid([9u8; 32])];
        store.add_log(tid, lg).await.unwrap();

        // No local records: the advertised tip is served.
        assert_eq!(store.heads(tid, lid).await.unwrap(), vec![Cid([9u8; 32])]);

        let chain = chain_of(3, &sk, &follow);
        for rec in &chain {
            store.put_record(tid, lid, rec).await.unwrap();
        }
        assert_eq!(store.heads(tid, lid).await.unwrap(), vec![chain[2].cid()]);
    }
}
