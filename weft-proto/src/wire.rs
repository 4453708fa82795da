//! Thread protocol wire messages.
//!
//! Hand-maintained prost derives, checked in so the crate builds without a
//! protoc toolchain. Field numbers are frozen; only append new fields.
//!
//! A [`ThreadMessage`] is the stream envelope: one request/reply exchange
//! per bidirectional stream. The gossip payload for a thread topic is the
//! canonical encoding of a `ThreadMessage` carrying a [`PushRecordRequest`],
//! byte-identical to what travels over a stream.

/// Request header: sender identity plus the transport-level authentication
/// and key material for the carried record.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Sender peer id (32 bytes).
    #[prost(bytes = "vec", tag = "1")]
    pub from: Vec<u8>,
    /// Ed25519 signature over the canonical record bytes (push only).
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    /// Sender public key, when the peer id alone is not extractable.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub key: Option<Vec<u8>>,
    /// Follow key for the carried record's log (bootstrap pushes only).
    #[prost(bytes = "vec", optional, tag = "4")]
    pub follow_key: Option<Vec<u8>>,
    /// Which log's read key seals the carried event body.
    #[prost(bytes = "vec", optional, tag = "5")]
    pub read_key_log_id: Option<Vec<u8>>,
}

/// A log descriptor as served by GetLogs.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Log {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub pub_key: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub follow_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub read_key: Option<Vec<u8>>,
    /// `/p2p/<peer-id>` address strings.
    #[prost(string, repeated, tag = "5")]
    pub addrs: Vec<String>,
    /// Chain tips (32-byte cids).
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub heads: Vec<Vec<u8>>,
}

/// A record on the wire: the sealed envelope and sealed event body.
/// Signing is over the canonical encoding of this message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Record {
    #[prost(bytes = "vec", tag = "1")]
    pub envelope: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLogsRequest {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(bytes = "vec", tag = "2")]
    pub thread_id: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLogsReply {
    #[prost(message, repeated, tag = "1")]
    pub logs: Vec<Log>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushRecordRequest {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(bytes = "vec", tag = "2")]
    pub thread_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub log_id: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub record: Option<Record>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushRecordReply {
    /// Set when the receiver became a follower of the pushed log and is now
    /// reachable at this address.
    #[prost(string, optional, tag = "1")]
    pub new_addr: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullRecordsRequest {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(bytes = "vec", tag = "2")]
    pub thread_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub log_id: Vec<u8>,
    /// Resume point (exclusive); absent means "from the beginning of the chain".
    #[prost(bytes = "vec", optional, tag = "4")]
    pub offset: Option<Vec<u8>>,
    #[prost(int32, tag = "5")]
    pub limit: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullRecordsReply {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<Record>,
}

/// Carried instead of a reply when a request is rejected.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorReply {
    #[prost(string, tag = "1")]
    pub error: String,
}

/// Stream envelope for the thread protocol.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ThreadMessage {
    #[prost(oneof = "thread_message::Message", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub message: Option<thread_message::Message>,
}

pub mod thread_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "1")]
        GetLogsRequest(super::GetLogsRequest),
        #[prost(message, tag = "2")]
        GetLogsReply(super::GetLogsReply),
        #[prost(message, tag = "3")]
        PushRecordRequest(super::PushRecordRequest),
        #[prost(message, tag = "4")]
        PushRecordReply(super::PushRecordReply),
        #[prost(message, tag = "5")]
        PullRecordsRequest(super::PullRecordsRequest),
        #[prost(message, tag = "6")]
        PullRecordsReply(super::PullRecordsReply),
        #[prost(message, tag = "7")]
        ErrorReply(super::ErrorReply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn push_request_roundtrip_is_byte_identical() {
        let req = PushRecordRequest {
            header: Some(Header {
                from: vec![1u8; 32],
                signature: vec![2u8; 64],
                key: Some(vec![3u8; 32]),
                follow_key: Some(vec![4u8; 32]),
                read_key_log_id: None,
            }),
            thread_id: vec![5u8; 16],
            log_id: vec![6u8; 32],
            record: Some(Record {
                envelope: vec![7u8; 48],
                body: vec![8u8; 40],
            }),
        };

        let msg = ThreadMessage {
            message: Some(thread_message::Message::PushRecordRequest(req)),
        };
        let bytes = msg.encode_to_vec();
        let decoded = ThreadMessage::decode(&bytes[..]).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.encode_to_vec(), bytes);
    }

    #[test]
    fn absent_optionals_stay_absent() {
        let req = PullRecordsRequest {
            header: Some(Header {
                from: vec![1u8; 32],
                ..Default::default()
            }),
            thread_id: vec![5u8; 16],
            log_id: vec![6u8; 32],
            offset: None,
            limit: 0,
        };
        let bytes = req.encode_to_vec();
        let decoded = PullRecordsRequest::decode(&bytes[..]).unwrap();
        assert_eq!(decoded.offset, None);
        assert_eq!(decoded.limit, 0);
    }
}
