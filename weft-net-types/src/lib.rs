//! Trait seams for weft networking
//!
//! Decouples the replication service (`weft-net`) from concrete transports,
//! gossip stacks, and stores. Production binds real implementations;
//! `weft-net-sim` provides in-memory ones for tests.

pub mod gossip;
pub mod store;
pub mod transport;

pub use gossip::{GossipError, GossipLayer};
pub use store::{LogStore, RecordStore, StoreError};
pub use transport::{BiStream, Connection, Transport, TransportError};
