//! Peer-addressed network addresses
//!
//! A log's address list names the peers it can be reached through, in the
//! `/p2p/<peer-id>` form. Parsing validates both the protocol tag and the
//! hex-encoded peer id, so malformed addresses are rejected at the edge.

use crate::types::PeerId;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A `/p2p/<peer-id>` address of a log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, borsh::BorshSerialize, borsh::BorshDeserialize)]
pub struct PeerAddr(PeerId);

impl PeerAddr {
    /// Address a peer directly.
    pub fn new(peer: PeerId) -> Self {
        Self(peer)
    }

    /// The peer this address points at.
    pub fn peer_id(&self) -> PeerId {
        self.0
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/p2p/{}", self.0)
    }
}

impl fmt::Debug for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddr({})", self)
    }
}

impl FromStr for PeerAddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("/p2p/")
            .ok_or_else(|| AddrError::Protocol(s.to_string()))?;
        let peer = PeerId::from_hex(rest).map_err(AddrError::PeerId)?;
        Ok(Self(peer))
    }
}

/// Malformed address error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    #[error("address is not /p2p/<peer-id>: {0}")]
    Protocol(String),

    #[error("invalid peer id in address: {0}")]
    PeerId(String),
}

/// Lifetime of a directory address entry.
///
/// Only `Permanent` is minted by the replication core; a directory
/// implementation may evict `Temporary` entries after their duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrTtl {
    Permanent,
    Temporary(Duration),
}
