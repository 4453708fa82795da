//! Out-of-line address-advertisement helper.
//!
//! Split from `service.rs` into its own module so the recursive call back
//! into `ReplicationService::add_record` (which itself can fan out through
//! `push_to_addr`, the caller of this helper) registers its opaque future
//! type in a separate defining scope from the call site, which is what
//! breaks rustc's cyclic auto-trait (`Send`) evaluation between the two.

use std::sync::Arc;

use weft_model::{LogInfo, Logs, ThreadId};
use weft_net_types::transport::Transport;

use crate::service::{AddSettings, ReplicationService};

pub(crate) async fn advertise_log<T: Transport>(
    service: Arc<ReplicationService<T>>,
    thread: ThreadId,
    log: weft_model::LogId,
    addr: weft_model::PeerAddr,
) {
    let pub_key = match service.directory_pub_key(thread, log).await {
        Ok(Some(pk)) => pk,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(error = %e, "address advertisement failed");
            return;
        }
    };
    let lg = LogInfo {
        id: log,
        pub_key,
        follow_key: None,
        read_key: None,
        addrs: vec![addr],
        heads: Vec::new(),
        priv_key: None,
    };
    let doc = Logs::new(vec![lg], true);
    if let Err(e) = service
        .add_record(
            thread,
            doc.to_borsh(),
            AddSettings {
                key_log: Some(log),
                ..Default::default()
            },
        )
        .await
    {
        tracing::error!(thread = %thread, log = %log, error = %e, "address advertisement failed");
    }
}
