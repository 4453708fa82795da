//! In-memory network backends for weft
//!
//! Implements the `weft-net-types` seams over tokio primitives so the
//! replication service can be exercised without a real peer-to-peer stack:
//! - [`ChannelTransport`]: duplex-stream connections routed by a shared
//!   [`ChannelNetwork`] broker
//! - [`BroadcastGossip`]: per-thread broadcast topics routed by a shared
//!   [`GossipNetwork`] broker

pub mod broadcast_gossip;
pub mod channel_transport;

pub use broadcast_gossip::{BroadcastGossip, GossipNetwork};
pub use channel_transport::{ChannelBiStream, ChannelConnection, ChannelNetwork, ChannelTransport};
