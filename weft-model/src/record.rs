//! Records: the immutable, content-addressed units of a log
//!
//! A record is doubly encrypted:
//! - the **envelope** seals the signed [`RecordNode`] under the log's
//!   *follow key* — possession means the right to relay;
//! - the **body** seals the event payload under the log's *read key* (or a
//!   sealed box addressed to a host, for invites) — possession means the
//!   right to interpret.
//!
//! Serialization:
//! - `RecordNode`/`SignedNode` use **Borsh** for deterministic hashing and
//!   signing; the sealed Borsh bytes are what travels in the envelope.
//! - A record's content id is `blake3(envelope)` — the hash of the sealed
//!   bytes, so relays that cannot read the node still agree on identity.

use crate::crypto::{self, CipherKey, CryptoError};
use crate::types::{Cid, Hash, PubKey, Signature, SymKey};
use borsh::{BorshDeserialize, BorshSerialize};

/// The unsigned interior of a record envelope.
///
/// Field order matches the canonical Borsh serialization order.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RecordNode {
    /// BLAKE3 hash of the sealed event body, binding body to envelope.
    pub event_cid: Hash,
    /// The previous record in this log's chain, `None` at genesis.
    pub prev: Option<Cid>,
    /// Writer wall-clock milliseconds, informational only.
    pub wall_time: u64,
}

impl RecordNode {
    /// Compute the canonical content hash: `blake3(borsh(self))`.
    /// This is the digest that gets signed.
    pub fn hash(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("borsh serialization cannot fail");
        crypto::content_hash(&bytes)
    }
}

/// A record node with its writer signature. This is what gets sealed under
/// the follow key.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedNode {
    pub node: RecordNode,
    /// Ed25519 signature over `blake3(borsh(node))` by the log signing key.
    pub signature: Signature,
}

impl SignedNode {
    /// Sign a node with the log's signing key.
    pub fn sign(node: RecordNode, signing_key: &ed25519_dalek::SigningKey) -> Self {
        let digest = node.hash();
        let signature = crypto::sign(signing_key, digest.as_bytes());
        Self { node, signature }
    }

    /// Verify the signature against the node's content hash.
    pub fn verify(&self, pub_key: &PubKey) -> Result<(), CryptoError> {
        let digest = self.node.hash();
        crypto::verify(pub_key, digest.as_bytes(), &self.signature)
    }
}

/// A fully materialized record: the sealed envelope and body as they travel
/// on the wire, plus the opened node.
///
/// Construction goes through [`Record::seal`] (writer side) or
/// [`Record::open`] (receiver side, requires the follow key); both enforce
/// the envelope/body binding, so a `Record` in hand is internally
/// consistent. Immutable once admitted.
#[derive(Debug, Clone)]
pub struct Record {
    cid: Cid,
    envelope: Vec<u8>,
    body: Vec<u8>,
    signed: SignedNode,
}

impl Record {
    /// Create a new record for a log: sign the node and seal it under the
    /// log's follow key. `body` is the already-sealed event body.
    pub fn seal(
        body: Vec<u8>,
        follow_key: &SymKey,
        signing_key: &ed25519_dalek::SigningKey,
        prev: Option<Cid>,
        wall_time: u64,
    ) -> Result<Self, RecordError> {
        let node = RecordNode {
            event_cid: crypto::content_hash(&body),
            prev,
            wall_time,
        };
        let signed = SignedNode::sign(node, signing_key);
        let plain = borsh::to_vec(&signed).expect("borsh serialization cannot fail");
        let envelope = crypto::seal_sym(follow_key, &plain)?;
        let cid = Cid(crypto::content_hash(&envelope).0);
        Ok(Self {
            cid,
            envelope,
            body,
            signed,
        })
    }

    /// Open a wire record with the log's follow key.
    ///
    /// Checks that the sealed body matches the `event_cid` the writer signed;
    /// a mismatched body means a tampered or mis-assembled record.
    pub fn open(envelope: Vec<u8>, body: Vec<u8>, follow_key: &SymKey) -> Result<Self, RecordError> {
        let plain = crypto::open_sym(follow_key, &envelope)?;
        let signed = SignedNode::try_from_slice(&plain)?;
        if signed.node.event_cid != crypto::content_hash(&body) {
            return Err(RecordError::BodyMismatch);
        }
        let cid = Cid(crypto::content_hash(&envelope).0);
        Ok(Self {
            cid,
            envelope,
            body,
            signed,
        })
    }

    /// Verify the writer signature against a log public key.
    pub fn verify(&self, pub_key: &PubKey) -> Result<(), RecordError> {
        self.signed.verify(pub_key).map_err(RecordError::from)
    }

    /// Decrypt the event body with a read key or host key.
    pub fn open_body(&self, key: &CipherKey) -> Result<Vec<u8>, RecordError> {
        key.decrypt(&self.body).map_err(RecordError::from)
    }

    /// The record's content id.
    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// The previous record in the chain, if any.
    pub fn prev(&self) -> Option<Cid> {
        self.signed.node.prev
    }

    /// Writer wall-clock milliseconds.
    pub fn wall_time(&self) -> u64 {
        self.signed.node.wall_time
    }

    /// The sealed envelope bytes (follow-key ciphertext of the signed node).
    pub fn envelope(&self) -> &[u8] {
        &self.envelope
    }

    /// The sealed event body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Record assembly and verification errors.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("node decode error: {0}")]
    Decode(#[from] borsh::io::Error),

    #[error("event body does not match the signed event cid")]
    BodyMismatch,
}
