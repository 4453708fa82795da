//! Transport abstraction for weft networking
//!
//! Decouples the replication service from any concrete peer-to-peer stack.
//! Production deployments bind a QUIC-style transport; simulation harnesses
//! provide in-memory implementations (`weft-net-sim`).

use std::fmt;
use weft_model::PubKey;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Accept failed: {0}")]
    Accept(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

/// A bidirectional byte stream (send + receive half).
///
/// Both halves must be independently usable. Implementations should
/// support length-delimited framing via `MessageSink`/`MessageStream`.
pub trait BiStream: Send + 'static {
    /// The send half of the stream.
    type SendStream: tokio::io::AsyncWrite + Send + Unpin;
    /// The receive half of the stream.
    type RecvStream: tokio::io::AsyncRead + Send + Unpin;

    /// Split into send and receive halves.
    fn into_split(self) -> (Self::SendStream, Self::RecvStream);
}

/// A connection to a remote peer that can carry bidirectional streams.
///
/// The initiating side `open_bi`s new streams; the accepting side's
/// `open_bi` yields the next stream the initiator opened.
pub trait Connection: Send + Sync + 'static {
    /// The bidirectional stream type produced by this connection.
    type Stream: BiStream;

    /// Open (initiator) or await (responder) the next bidirectional stream.
    fn open_bi(
        &self,
    ) -> impl std::future::Future<Output = Result<Self::Stream, TransportError>> + Send;

    /// Get the remote peer's public key.
    fn remote_public_key(&self) -> PubKey;
}

/// Transport layer abstraction.
///
/// Provides peer identity, outbound connections, and inbound connection
/// acceptance. This is the seam for swapping a real QUIC stack with
/// in-memory channels.
pub trait Transport: Send + Sync + fmt::Debug + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// This node's public key (identity).
    fn public_key(&self) -> PubKey;

    /// Connect to a remote peer by public key.
    fn connect(
        &self,
        peer: &PubKey,
    ) -> impl std::future::Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Accept an incoming connection (blocks until one arrives, or returns
    /// None on shutdown).
    fn accept(&self) -> impl std::future::Future<Output = Option<Self::Connection>> + Send;
}
