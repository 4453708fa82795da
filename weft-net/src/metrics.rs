//! Replication counters
//!
//! Plain atomic counters, readable by tests and host processes. Notably,
//! `log_update_errors` surfaces membership updates that were swallowed on
//! the known-log admission path — the record is admitted anyway, and this
//! counter is the only trace of the dropped update.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ReplicationMetrics {
    records_admitted: AtomicU64,
    records_deduped: AtomicU64,
    log_update_errors: AtomicU64,
    fanout_failures: AtomicU64,
    history_pull_failures: AtomicU64,
}

impl ReplicationMetrics {
    pub fn records_admitted(&self) -> u64 {
        self.records_admitted.load(Ordering::Relaxed)
    }

    pub fn records_deduped(&self) -> u64 {
        self.records_deduped.load(Ordering::Relaxed)
    }

    pub fn log_update_errors(&self) -> u64 {
        self.log_update_errors.load(Ordering::Relaxed)
    }

    pub fn fanout_failures(&self) -> u64 {
        self.fanout_failures.load(Ordering::Relaxed)
    }

    pub fn history_pull_failures(&self) -> u64 {
        self.history_pull_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_admitted(&self) {
        self.records_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_deduped(&self) {
        self.records_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_log_update_errors(&self) {
        self.log_update_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_fanout_failures(&self) {
        self.fanout_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_history_pull_failures(&self) {
        self.history_pull_failures.fetch_add(1, Ordering::Relaxed);
    }
}
