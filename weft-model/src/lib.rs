//! Core data model for the weft replication network.
//!
//! weft replicates *threads*: named collections of single-writer,
//! hash-chained logs of encrypted records. This crate holds the strong
//! types, the crypto adapter, the host identity, and the record/membership
//! data model. Networking lives in `weft-net`; storage seams in
//! `weft-net-types`.

pub mod addr;
pub mod crypto;
pub mod identity;
pub mod record;
pub mod thread;
pub mod types;

pub use addr::{AddrError, AddrTtl, PeerAddr};
pub use crypto::{CipherKey, CryptoError};
pub use identity::Identity;
pub use record::{Record, RecordError, RecordNode, SignedNode};
pub use thread::{LogInfo, Logs, ThreadId, ThreadInfo, ThreadRole};
pub use types::{Cid, Hash, LogId, PeerId, PubKey, Signature, SymKey};
