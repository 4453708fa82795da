//! The weft replication service
//!
//! Keeps per-thread append-only logs consistent across subscribed peers:
//! - **Service**: the four symmetric wire operations (GetLogs, PushRecord,
//!   PullRecords, pubsub delivery) and the bootstrap/merge state machine
//! - **Handlers**: inbound connection and stream dispatch
//! - **Subscriber**: one gossip loop per subscribed thread
//! - **Framing**: length-delimited message framing for protocol streams

mod advertise;
pub mod config;
pub mod error;
pub mod framing;
mod handlers;
pub mod metrics;
pub mod service;
mod subscriber;

pub use config::ReplicationConfig;
pub use error::WeftNetError;
pub use framing::{MessageSink, MessageStream};
pub use metrics::ReplicationMetrics;
pub use service::{AddSettings, ReplicationService};
