//! Wire protocol for weft thread replication.
//!
//! Split into the prost message definitions (`wire`) and the model ↔ proto
//! conversion helpers (`convert`).

pub mod convert;
pub mod wire;

pub use convert::{log_from_proto, log_to_proto, record_from_proto, record_to_proto};
