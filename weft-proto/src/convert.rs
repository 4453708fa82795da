//! Model ↔ wire conversion helpers.
//!
//! Standalone functions because the orphan rule prevents `From`/`TryFrom`
//! impls when both sides come from foreign crates (weft-model, weft-proto).

use weft_model::{Cid, LogId, LogInfo, PeerAddr, PubKey, Record, RecordError, SymKey};

// ==================== Record ====================

/// Model → wire (infallible). The sealed envelope and body bytes flow
/// through unchanged — they are never re-encrypted.
pub fn record_to_proto(rec: &Record) -> crate::wire::Record {
    crate::wire::Record {
        envelope: rec.envelope().to_vec(),
        body: rec.body().to_vec(),
    }
}

/// Wire → model (fallible: envelope decryption + body binding).
pub fn record_from_proto(
    proto: &crate::wire::Record,
    follow_key: &SymKey,
) -> Result<Record, RecordError> {
    Record::open(proto.envelope.clone(), proto.body.clone(), follow_key)
}

// ==================== Log descriptors ====================

/// Model → wire. Signing keys never cross this boundary.
pub fn log_to_proto(lg: &LogInfo) -> crate::wire::Log {
    crate::wire::Log {
        id: lg.id.as_bytes().to_vec(),
        pub_key: lg.pub_key.as_bytes().to_vec(),
        follow_key: lg.follow_key.map(|k| k.as_bytes().to_vec()),
        read_key: lg.read_key.map(|k| k.as_bytes().to_vec()),
        addrs: lg.addrs.iter().map(|a| a.to_string()).collect(),
        heads: lg.heads.iter().map(|h| h.as_bytes().to_vec()).collect(),
    }
}

/// Wire → model (fallible: field lengths + address parsing).
pub fn log_from_proto(proto: &crate::wire::Log) -> Result<LogInfo, String> {
    let id = LogId::try_from(proto.id.as_slice()).map_err(|_| "invalid log id".to_string())?;
    let pub_key =
        PubKey::try_from(proto.pub_key.as_slice()).map_err(|_| "invalid public key".to_string())?;
    let follow_key = proto
        .follow_key
        .as_deref()
        .map(SymKey::try_from)
        .transpose()
        .map_err(|_| "invalid follow key".to_string())?;
    let read_key = proto
        .read_key
        .as_deref()
        .map(SymKey::try_from)
        .transpose()
        .map_err(|_| "invalid read key".to_string())?;
    let addrs = proto
        .addrs
        .iter()
        .map(|s| s.parse::<PeerAddr>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    let heads = proto
        .heads
        .iter()
        .map(|h| Cid::try_from(h.as_slice()).map_err(|_| "invalid head cid".to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LogInfo {
        id,
        pub_key,
        follow_key,
        read_key,
        addrs,
        heads,
        priv_key: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_model::crypto::generate_sym_key;
    use weft_model::{PeerAddr, PeerId};

    #[test]
    fn record_proto_roundtrip() {
        let sk = ed25519_dalek::SigningKey::from_bytes(&[3u8; 32]);
        let follow = generate_sym_key();
        let rec = Record::seal(b"body".to_vec(), &follow, &sk, None, 7).unwrap();

        let proto = record_to_proto(&rec);
        let back = record_from_proto(&proto, &follow).unwrap();
        assert_eq!(back.cid(), rec.cid());
        assert_eq!(back.envelope(), rec.envelope());
    }

    #[test]
    fn log_proto_roundtrip() {
        let lg = LogInfo::generate(PeerAddr::new(PeerId([9u8; 32])));
        let proto = log_to_proto(&lg);
        let back = log_from_proto(&proto).unwrap();
        assert_eq!(back.id, lg.id);
        assert_eq!(back.pub_key, lg.pub_key);
        assert_eq!(back.follow_key, lg.follow_key);
        assert_eq!(back.read_key, lg.read_key);
        assert_eq!(back.addrs, lg.addrs);
        assert!(back.priv_key.is_none());
    }

    #[test]
    fn log_from_proto_rejects_bad_addr() {
        let lg = LogInfo::generate(PeerAddr::new(PeerId([9u8; 32])));
        let mut proto = log_to_proto(&lg);
        proto.addrs.push("/dns4/example.com".to_string());
        assert!(log_from_proto(&proto).is_err());
    }

    #[test]
    fn log_from_proto_rejects_short_id() {
        let lg = LogInfo::generate(PeerAddr::new(PeerId([9u8; 32])));
        let mut proto = log_to_proto(&lg);
        proto.id.truncate(10);
        assert!(log_from_proto(&proto).is_err());
    }
}
