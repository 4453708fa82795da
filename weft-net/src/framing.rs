//! Message framing for bidirectional streams using tokio-util LengthDelimitedCodec
//!
//! Provides a clean interface for sending/receiving length-prefixed
//! ThreadMessage over any AsyncWrite/AsyncRead stream, decoupled from
//! transport-specific types.

use crate::error::WeftNetError;
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use weft_proto::wire::ThreadMessage;

/// Framed writer for sending ThreadMessage over any AsyncWrite stream
pub struct MessageSink<W: AsyncWrite + Send + Unpin> {
    inner: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Send + Unpin> MessageSink<W> {
    pub fn new(stream: W) -> Self {
        Self {
            inner: FramedWrite::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Send a ThreadMessage (length-prefixed)
    pub async fn send(&mut self, msg: &ThreadMessage) -> Result<(), WeftNetError> {
        let bytes = msg.encode_to_vec();
        self.inner
            .send(bytes.into())
            .await
            .map_err(WeftNetError::Io)
    }
}

/// Framed reader for receiving ThreadMessage from any AsyncRead stream
pub struct MessageStream<R: AsyncRead + Send + Unpin> {
    inner: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Send + Unpin> MessageStream<R> {
    pub fn new(stream: R) -> Self {
        Self {
            inner: FramedRead::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Receive next ThreadMessage (or None if stream closed)
    pub async fn recv(&mut self) -> Result<Option<ThreadMessage>, WeftNetError> {
        match self.inner.next().await {
            Some(Ok(bytes)) => ThreadMessage::decode(&bytes[..])
                .map(Some)
                .map_err(WeftNetError::from),
            Some(Err(e)) => Err(WeftNetError::Io(e)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_proto::wire::{thread_message, GetLogsRequest, Header};

    #[tokio::test]
    async fn send_recv_roundtrip() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, client_write) = tokio::io::split(client);
        let (server_read, _) = tokio::io::split(server);

        let mut sink = MessageSink::new(client_write);
        let mut stream = MessageStream::new(server_read);

        let msg = ThreadMessage {
            message: Some(thread_message::Message::GetLogsRequest(GetLogsRequest {
                header: Some(Header {
                    from: vec![1u8; 32],
                    ..Default::default()
                }),
                thread_id: vec![2u8; 16],
            })),
        };

        sink.send(&msg).await.unwrap();
        let received = stream.recv().await.unwrap().unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn closed_stream_yields_none() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, client_write) = tokio::io::split(client);
        let (server_read, _) = tokio::io::split(server);

        drop(MessageSink::new(client_write));
        let mut stream = MessageStream::new(server_read);
        assert!(stream.recv().await.unwrap().is_none());
    }
}
