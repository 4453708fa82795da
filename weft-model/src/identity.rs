//! Host identity and cryptographic keys
//!
//! Each peer has an Ed25519 keypair:
//! - Private key: held by the host process (never replicated)
//! - Public key: serves as the peer's identity (32 bytes)
//!
//! The same keypair doubles, via Ed25519 → X25519 conversion, as the
//! decryption key for sealed event bodies addressed to this host.

use crate::crypto::{self, CipherKey};
use crate::types::{PeerId, PubKey, Signature};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

/// A peer identity in the weft network.
///
/// Used for signing transport envelopes, for minting own logs, and for
/// opening invite bodies sealed to this host.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a new identity with a random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create an identity from an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// The peer's public key as a strong type.
    pub fn public_key(&self) -> PubKey {
        PubKey::from(self.signing_key.verifying_key().to_bytes())
    }

    /// The peer id bound to this identity's public key.
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key())
    }

    /// The signing key, for log minting and transport integration.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// The asymmetric decryption key derived from the host signing key.
    ///
    /// This is the bootstrap key: event bodies of invites to brand-new
    /// threads are sealed to it.
    pub fn decryption_key(&self) -> CipherKey {
        CipherKey::Sealed(crypto::secret_ed_box(&self.signing_key))
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("peer", &self.peer_id())
            .finish()
    }
}
