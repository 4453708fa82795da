//! Threads, logs, and the membership document
//!
//! A thread is a named collection of single-writer logs. Each log is
//! described by a [`LogInfo`] descriptor carrying its identity, key
//! material, reachable addresses, and chain tips.

use crate::addr::PeerAddr;
use crate::crypto;
use crate::types::{Cid, LogId, PubKey, SymKey};
use borsh::{BorshDeserialize, BorshSerialize};
use uuid::Uuid;

/// Opaque stable identifier of a thread.
///
/// The string form names the thread's gossip topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(Uuid);

impl ThreadId {
    /// Mint a fresh random thread id.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// The 16 raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parse from raw bytes (wire form).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|e| format!("invalid thread id: {}", e))
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Descriptor of one writer's log within a thread.
///
/// The public key is mandatory for any log we accept. A log with only a
/// follow key is *followable* (its records can be relayed); a log with a
/// read key is additionally *readable* (its event bodies can be decoded).
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct LogInfo {
    /// The log's identity, bound to `pub_key`.
    pub id: LogId,
    /// The log's signing public key.
    pub pub_key: PubKey,
    /// Symmetric key for the record envelope, if held.
    pub follow_key: Option<SymKey>,
    /// Symmetric key for event bodies, if held.
    pub read_key: Option<SymKey>,
    /// Addresses the log is reachable through, in discovery order.
    pub addrs: Vec<PeerAddr>,
    /// Known chain tips.
    pub heads: Vec<Cid>,
    /// The signing key, present only for logs this host writes.
    /// Never serialized or sent over the wire.
    #[borsh(skip)]
    pub priv_key: Option<ed25519_dalek::SigningKey>,
}

impl LogInfo {
    /// Mint a fresh local log: new keypair, new follow and read keys,
    /// reachable at the given address.
    pub fn generate(addr: PeerAddr) -> Self {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let pub_key = PubKey::from(signing_key.verifying_key().to_bytes());
        Self {
            id: LogId::from_public_key(&pub_key),
            pub_key,
            follow_key: Some(crypto::generate_sym_key()),
            read_key: Some(crypto::generate_sym_key()),
            addrs: vec![addr],
            heads: Vec::new(),
            priv_key: Some(signing_key),
        }
    }

    /// A copy without the signing key, safe to hand to other components.
    pub fn public_view(&self) -> Self {
        Self {
            priv_key: None,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for LogInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogInfo")
            .field("id", &self.id)
            .field("followable", &self.follow_key.is_some())
            .field("readable", &self.read_key.is_some())
            .field("writable", &self.priv_key.is_some())
            .field("addrs", &self.addrs)
            .field("heads", &self.heads)
            .finish()
    }
}

/// Summary of a thread: the set of logs it is known to contain.
#[derive(Debug, Clone, Default)]
pub struct ThreadInfo {
    pub logs: Vec<LogId>,
}

impl ThreadInfo {
    pub fn new(logs: Vec<LogId>) -> Self {
        Self { logs }
    }
}

/// The role this peer occupies with respect to a thread, derived from the
/// key material the directory holds. Own-log creation is only possible for
/// readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRole {
    /// The thread is unknown here.
    Absent,
    /// Follow keys only: records can be relayed but bodies not decoded.
    Follower,
    /// At least one read key: full participant.
    Reader,
}

/// The membership document carried in bootstrap and log-update event bodies:
/// a set of log descriptors, and whether the recipient is being admitted as
/// a reader (read keys included) or a mere follower.
///
/// Serialization is canonical Borsh; the wire carries the opaque bytes
/// inside a sealed event body.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub struct Logs {
    logs: Vec<LogInfo>,
    readable: bool,
}

impl Logs {
    /// Build a membership document. When `readable` is false the read keys
    /// are stripped from every descriptor: the recipient is admitted as a
    /// follower. Signing keys never enter the document.
    pub fn new(logs: Vec<LogInfo>, readable: bool) -> Self {
        let logs = logs
            .into_iter()
            .map(|mut lg| {
                lg.priv_key = None;
                if !readable {
                    lg.read_key = None;
                }
                lg
            })
            .collect();
        Self { logs, readable }
    }

    /// The log descriptors.
    pub fn logs(&self) -> &[LogInfo] {
        &self.logs
    }

    /// Whether any descriptor carries a read key.
    pub fn readable(&self) -> bool {
        self.readable && self.logs.iter().any(|lg| lg.read_key.is_some())
    }

    /// Serialize to canonical Borsh bytes.
    pub fn to_borsh(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("borsh serialization cannot fail")
    }

    /// Deserialize from Borsh bytes.
    pub fn from_borsh(bytes: &[u8]) -> Result<Self, borsh::io::Error> {
        borsh::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerId;

    fn own_addr() -> PeerAddr {
        PeerAddr::new(PeerId([1u8; 32]))
    }

    #[test]
    fn generate_binds_id_to_key() {
        let lg = LogInfo::generate(own_addr());
        assert!(lg.id.matches(&lg.pub_key));
        assert!(lg.priv_key.is_some());
        assert!(lg.follow_key.is_some());
        assert!(lg.read_key.is_some());
    }

    #[test]
    fn public_view_drops_signing_key() {
        let lg = LogInfo::generate(own_addr());
        assert!(lg.public_view().priv_key.is_none());
    }

    #[test]
    fn readable_logs_keep_read_keys() {
        let lg = LogInfo::generate(own_addr());
        let doc = Logs::new(vec![lg], true);
        assert!(doc.readable());
        assert!(doc.logs()[0].read_key.is_some());
        assert!(doc.logs()[0].priv_key.is_none());
    }

    #[test]
    fn follower_logs_strip_read_keys() {
        let lg = LogInfo::generate(own_addr());
        let doc = Logs::new(vec![lg], false);
        assert!(!doc.readable());
        assert!(doc.logs()[0].read_key.is_none());
        assert!(doc.logs()[0].follow_key.is_some());
    }

    #[test]
    fn borsh_roundtrip() {
        let lg = LogInfo::generate(own_addr());
        let doc = Logs::new(vec![lg.clone()], true);
        let bytes = doc.to_borsh();
        let decoded = Logs::from_borsh(&bytes).unwrap();
        assert_eq!(decoded.logs().len(), 1);
        assert_eq!(decoded.logs()[0].id, lg.id);
        assert_eq!(decoded.logs()[0].pub_key, lg.pub_key);
        assert_eq!(decoded.logs()[0].read_key, lg.read_key);
        assert!(decoded.logs()[0].priv_key.is_none());
        assert!(decoded.readable());
    }

    #[test]
    fn thread_id_wire_roundtrip() {
        let tid = ThreadId::new_random();
        let back = ThreadId::from_slice(tid.as_bytes()).unwrap();
        assert_eq!(tid, back);
        assert!(ThreadId::from_slice(&[1, 2, 3]).is_err());
    }
}
