//! Inbound protocol handlers
//!
//! The accept loop owns the transport's inbound side: one task per
//! connection, one task per stream, one request/reply exchange per stream.
//! Gossip and direct RPC converge on the same service methods — any
//! verification logic lives there, not here.

use crate::error::WeftNetError;
use crate::framing::{MessageSink, MessageStream};
use crate::service::ReplicationService;
use std::sync::Arc;
use std::time::Duration;
use weft_net_types::transport::{BiStream, Connection, Transport};
use weft_proto::wire::{self, thread_message};

const STREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// Accept inbound connections until the transport closes or the service
/// shuts down.
pub(crate) async fn run_accept_loop<T: Transport>(service: Arc<ReplicationService<T>>) {
    loop {
        tokio::select! {
            _ = service.cancel_token().cancelled() => break,
            conn = service.transport().accept() => {
                let Some(conn) = conn else { break };
                let service = service.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(service, conn).await {
                        tracing::debug!("Connection handler error: {}", e);
                    }
                });
            }
        }
    }
    tracing::debug!("accept loop ended");
}

/// Handle a single incoming connection (keep accepting streams).
async fn handle_connection<T: Transport>(
    service: Arc<ReplicationService<T>>,
    conn: T::Connection,
) -> Result<(), WeftNetError> {
    let remote = conn.remote_public_key();
    tracing::debug!(peer = %remote, "incoming connection");

    loop {
        match conn.open_bi().await {
            Ok(stream) => {
                let service = service.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(service, stream).await {
                        tracing::debug!("Stream handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::debug!("Connection closed: {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// One request/reply exchange on a bidirectional stream. Rejections travel
/// back as an ErrorReply so the caller sees the reason.
async fn handle_stream<T: Transport>(
    service: Arc<ReplicationService<T>>,
    stream: <T::Connection as Connection>::Stream,
) -> Result<(), WeftNetError> {
    let (send, recv) = stream.into_split();
    let mut sink = MessageSink::new(send);
    let mut stream = MessageStream::new(recv);

    let msg = match tokio::time::timeout(STREAM_TIMEOUT, stream.recv()).await {
        Ok(Ok(Some(msg))) => msg,
        Ok(Ok(None)) => return Ok(()), // Stream closed cleanly
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            tracing::debug!("Stream timed out");
            return Ok(());
        }
    };

    let reply = dispatch(&service, msg).await;
    sink.send(&wire::ThreadMessage {
        message: Some(reply),
    })
    .await
}

async fn dispatch<T: Transport>(
    service: &Arc<ReplicationService<T>>,
    msg: wire::ThreadMessage,
) -> thread_message::Message {
    use thread_message::Message;
    match msg.message {
        Some(Message::GetLogsRequest(req)) => match service.get_logs(&req).await {
            Ok(reply) => Message::GetLogsReply(reply),
            Err(e) => error_reply(e),
        },
        Some(Message::PushRecordRequest(req)) => match service.push_record(req).await {
            Ok(reply) => Message::PushRecordReply(reply),
            Err(e) => error_reply(e),
        },
        Some(Message::PullRecordsRequest(req)) => match service.pull_records(&req).await {
            Ok(reply) => Message::PullRecordsReply(reply),
            Err(e) => error_reply(e),
        },
        _ => error_reply(WeftNetError::Protocol("unexpected message".into())),
    }
}

fn error_reply(e: WeftNetError) -> thread_message::Message {
    tracing::debug!(error = %e, "request rejected");
    thread_message::Message::ErrorReply(wire::ErrorReply {
        error: e.to_string(),
    })
}
