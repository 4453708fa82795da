//! BroadcastGossip — in-memory GossipLayer implementation
//!
//! Uses `tokio::sync::broadcast` for per-thread raw-bytes propagation.
//! Mirrors the `ChannelNetwork` pattern: a shared `GossipNetwork` broker
//! connects multiple `BroadcastGossip` instances.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use weft_model::{PubKey, ThreadId};
use weft_net_types::{GossipError, GossipLayer};

/// Shared broadcast network — routes raw bytes between BroadcastGossip
/// instances.
///
/// Each thread topic gets a broadcast channel. All subscribed nodes for
/// that topic share the same channel, simulating gossip propagation.
#[derive(Clone, Debug, Default)]
pub struct GossipNetwork {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<(PubKey, Vec<u8>)>>>>,
}

impl GossipNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the broadcast channel for a thread topic.
    pub async fn get_or_create(&self, thread: ThreadId) -> broadcast::Sender<(PubKey, Vec<u8>)> {
        let mut channels = self.channels.write().await;
        channels
            .entry(thread.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }
}

/// In-memory GossipLayer implementation using broadcast channels.
///
/// Each `BroadcastGossip` instance belongs to one node. The gossip layer
/// only deals with raw bytes — decoding and admission are handled by the
/// replication service.
pub struct BroadcastGossip {
    my_pubkey: PubKey,
    network: GossipNetwork,
    topic_tokens: Arc<Mutex<HashMap<ThreadId, tokio_util::sync::CancellationToken>>>,
    topic_senders: Arc<Mutex<HashMap<ThreadId, broadcast::Sender<(PubKey, Vec<u8>)>>>>,
}

impl BroadcastGossip {
    pub fn new(pubkey: PubKey, network: &GossipNetwork) -> Self {
        Self {
            my_pubkey: pubkey,
            network: network.clone(),
            topic_tokens: Arc::new(Mutex::new(HashMap::new())),
            topic_senders: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait::async_trait]
impl GossipLayer for BroadcastGossip {
    async fn subscribe(
        &self,
        thread: ThreadId,
        _initial_peers: Vec<PubKey>,
    ) -> Result<broadcast::Receiver<(PubKey, Vec<u8>)>, GossipError> {
        // Tear down existing subscription if any
        self.unsubscribe(thread).await;

        let sender = self.network.get_or_create(thread).await;
        let mut receiver = sender.subscribe();
        let my_pubkey = self.my_pubkey;

        let token = tokio_util::sync::CancellationToken::new();
        self.topic_tokens.lock().await.insert(thread, token.clone());

        // Store the sender for broadcast()
        self.topic_senders.lock().await.insert(thread, sender);

        // Create the inbound channel for this thread
        let (inbound_tx, inbound_rx) = broadcast::channel(256);

        // Receive task: route incoming bytes, skip our own messages
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = receiver.recv() => {
                        match result {
                            Ok((sender_pubkey, data)) => {
                                // Skip our own messages
                                if sender_pubkey == my_pubkey {
                                    continue;
                                }
                                let _ = inbound_tx.send((sender_pubkey, data));
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(lagged = n, "Broadcast gossip receiver lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        tracing::debug!(thread = %thread, "BroadcastGossip subscribed");
        Ok(inbound_rx)
    }

    async fn broadcast(&self, thread: ThreadId, data: Vec<u8>) -> Result<(), GossipError> {
        let senders = self.topic_senders.lock().await;
        if let Some(sender) = senders.get(&thread) {
            let _ = sender.send((self.my_pubkey, data));
        }
        Ok(())
    }

    async fn unsubscribe(&self, thread: ThreadId) {
        if let Some(token) = self.topic_tokens.lock().await.remove(&thread) {
            token.cancel();
        }
        self.topic_senders.lock().await.remove(&thread);
    }

    async fn shutdown(&self) {
        let mut tokens = self.topic_tokens.lock().await;
        for (_, token) in tokens.drain() {
            token.cancel();
        }
        self.topic_senders.lock().await.clear();
    }
}
