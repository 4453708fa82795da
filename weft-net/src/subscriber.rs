//! Per-thread subscription loop
//!
//! One long-lived task per subscribed thread, consuming the thread's gossip
//! topic and funneling every payload into the same PushRecord handler the
//! direct RPC path uses. Self-originated messages are discarded without
//! reprocessing; per-iteration failures are logged and the loop continues;
//! the loop ends on cancellation or when the subscriber closes.

use crate::service::ReplicationService;
use prost::Message;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use weft_model::{PubKey, ThreadId};
use weft_net_types::Transport;
use weft_proto::wire::{thread_message, ThreadMessage};

pub(crate) async fn run<T: Transport>(
    service: Arc<ReplicationService<T>>,
    thread: ThreadId,
    mut rx: broadcast::Receiver<(PubKey, Vec<u8>)>,
    token: CancellationToken,
) {
    tracing::debug!(thread = %thread, "subscription loop started");
    loop {
        let (sender, data) = tokio::select! {
            _ = token.cancelled() => break,
            result = rx.recv() => match result {
                Ok(item) => item,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(thread = %thread, skipped = n, "subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        };

        // A record originated here must not be reprocessed when it echoes
        // back off the topic.
        if sender == service.identity().public_key() {
            continue;
        }

        let msg = match ThreadMessage::decode(&data[..]) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(thread = %thread, error = %e, "bad topic payload");
                continue;
            }
        };
        let Some(thread_message::Message::PushRecordRequest(req)) = msg.message else {
            tracing::debug!(thread = %thread, "ignoring non-push topic message");
            continue;
        };

        tracing::debug!(thread = %thread, from = %sender, "received multicast record");

        if let Err(e) = service.push_record(req).await {
            tracing::error!(thread = %thread, error = %e, "multicast record rejected");
            continue;
        }
    }
    tracing::debug!(thread = %thread, "subscription loop ended");
}
