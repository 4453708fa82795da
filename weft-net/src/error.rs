//! Error types for the weft-net crate

use thiserror::Error;
use weft_model::{CryptoError, RecordError};
use weft_net_types::{GossipError, StoreError};

/// Replication service errors.
///
/// Malformed requests, missing key material, and store failures surface to
/// the RPC caller; fan-out peer failures and per-iteration subscription
/// failures are logged and swallowed at their call sites instead.
#[derive(Error, Debug)]
pub enum WeftNetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("request header is required")]
    MissingHeader,

    #[error("bad signing key: {0}")]
    Signer(String),

    #[error("bad signature")]
    BadSignature,

    #[error("follow key not found")]
    FollowKeyNotFound,

    #[error("read key not found")]
    ReadKeyNotFound,

    #[error("invalid log")]
    InvalidLog,

    #[error("log not found")]
    LogNotFound,

    #[error("no writable log for this thread")]
    NoOwnLog,

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gossip(#[from] GossipError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("remote error: {0}")]
    Remote(String),
}
