//! Gossip layer abstraction for weft networking
//!
//! Pure transport-level gossip: subscribe to per-thread topics and exchange
//! raw bytes. Proto encoding/decoding and record admission live in
//! `weft-net`.

use tokio::sync::broadcast;
use weft_model::{PubKey, ThreadId};

/// Error type for gossip operations.
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    #[error("Subscribe failed: {0}")]
    Subscribe(String),
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
}

/// Pure transport-level gossip interface.
///
/// Implementations deal only with raw bytes and peer connectivity. The
/// topic for a thread is keyed by the thread id's string form.
#[async_trait::async_trait]
pub trait GossipLayer: Send + Sync + 'static {
    /// Subscribe to a thread's gossip topic.
    /// Returns a receiver of (sender_pubkey, raw_message_bytes).
    async fn subscribe(
        &self,
        thread: ThreadId,
        initial_peers: Vec<PubKey>,
    ) -> Result<broadcast::Receiver<(PubKey, Vec<u8>)>, GossipError>;

    /// Broadcast raw bytes to all peers on a thread's topic.
    async fn broadcast(&self, thread: ThreadId, data: Vec<u8>) -> Result<(), GossipError>;

    /// Unsubscribe gossip for a specific thread.
    async fn unsubscribe(&self, thread: ThreadId);

    /// Shut down the entire gossip layer.
    async fn shutdown(&self);
}
