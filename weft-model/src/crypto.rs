//! Centralized cryptographic operations for weft.
//!
//! **All** Ed25519 signing, verification, BLAKE3 hashing, symmetric sealing
//! and sealed-box operations go through this module. This provides a single
//! audit surface for cryptographic correctness.
//!
//! # Primitives
//!
//! | Primitive   | Algorithm              | Purpose                                  |
//! |-------------|------------------------|------------------------------------------|
//! | Hash        | BLAKE3 (32 B)          | Content addressing, record ids           |
//! | Signature   | Ed25519 (64 B)         | Record and transport signing             |
//! | Follow/Read | XChaCha20-Poly1305     | Record envelope / event body sealing     |
//! | Invite      | X25519 sealed box      | Event bodies addressed to a host key     |

use crate::types::{Hash, LogId, PeerId, PubKey, Signature, SymKey};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

/// XChaCha20-Poly1305 nonce length, prefixed to symmetric ciphertexts.
const NONCE_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Content hashing (BLAKE3)
// ---------------------------------------------------------------------------

/// Compute the BLAKE3 content hash of arbitrary bytes.
///
/// Used for: record content addressing, event body binding, signing digests.
#[inline]
pub fn content_hash(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

// ---------------------------------------------------------------------------
// Ed25519 signing
// ---------------------------------------------------------------------------

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &ed25519_dalek::SigningKey, message: &[u8]) -> Signature {
    use ed25519_dalek::Signer;
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify an Ed25519 signature over a message.
pub fn verify(pubkey: &PubKey, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
    use ed25519_dalek::Verifier;
    let vk = verifying_key(pubkey)?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Deserialize a `PubKey` into an Ed25519 `VerifyingKey`.
///
/// Fails if the 32 bytes are not a valid curve point.
pub fn verifying_key(pubkey: &PubKey) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
    ed25519_dalek::VerifyingKey::from_bytes(&pubkey.0).map_err(|_| CryptoError::InvalidPublicKey)
}

impl LogId {
    /// Recover the public key this id is bound to.
    ///
    /// Fails when the id bytes are not a valid curve point, i.e. the identity
    /// is not key-extractable and a descriptor must carry the key explicitly.
    pub fn extract_public_key(&self) -> Result<PubKey, CryptoError> {
        let pk = PubKey(self.0);
        verifying_key(&pk)?;
        Ok(pk)
    }
}

impl PeerId {
    /// Recover the public key this id is bound to. See [`LogId::extract_public_key`].
    pub fn extract_public_key(&self) -> Result<PubKey, CryptoError> {
        let pk = PubKey(self.0);
        verifying_key(&pk)?;
        Ok(pk)
    }
}

// ---------------------------------------------------------------------------
// Symmetric sealing (follow / read keys)
// ---------------------------------------------------------------------------

/// Generate a fresh symmetric key from the OS CSPRNG.
pub fn generate_sym_key() -> SymKey {
    use rand::RngCore;
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    SymKey(key)
}

/// Seal plaintext under a symmetric key. The 24-byte nonce is prefixed to
/// the ciphertext.
pub fn seal_sym(key: &SymKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(out)
}

/// Open a ciphertext produced by [`seal_sym`].
pub fn open_sym(key: &SymKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() <= NONCE_LEN {
        return Err(CryptoError::Decrypt);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decrypt)
}

// ---------------------------------------------------------------------------
// Sealed boxes (event bodies addressed to a host key)
// ---------------------------------------------------------------------------

/// Convert an Ed25519 verifying key to its X25519 encryption counterpart.
fn public_ed_box(key: &ed25519_dalek::VerifyingKey) -> crypto_box::PublicKey {
    crypto_box::PublicKey::from(key.to_montgomery())
}

/// Convert an Ed25519 signing key to its X25519 decryption counterpart.
pub(crate) fn secret_ed_box(key: &ed25519_dalek::SigningKey) -> crypto_box::SecretKey {
    crypto_box::SecretKey::from(key.to_scalar())
}

/// Seal plaintext to a peer's public key. Only the holder of the matching
/// host signing key can open it.
pub fn seal_to(pubkey: &PubKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let vk = verifying_key(pubkey)?;
    public_ed_box(&vk)
        .seal(&mut OsRng, plaintext)
        .map_err(|_| CryptoError::Encrypt)
}

/// Open a sealed box with the host's derived decryption key.
pub fn open_sealed(secret: &crypto_box::SecretKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    secret.unseal(sealed).map_err(|_| CryptoError::Decrypt)
}

// ---------------------------------------------------------------------------
// Decryption key selector
// ---------------------------------------------------------------------------

/// A key capable of opening an event body: either a symmetric read key held
/// in the log directory, or the asymmetric key derived from the host
/// identity (the bootstrap path for brand-new threads).
#[derive(Clone)]
pub enum CipherKey {
    /// Symmetric XChaCha20-Poly1305 key.
    Sym(SymKey),
    /// Sealed-box key derived from the host signing key.
    Sealed(crypto_box::SecretKey),
}

impl CipherKey {
    /// Open a ciphertext with this key.
    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            CipherKey::Sym(key) => open_sym(key, sealed),
            CipherKey::Sealed(secret) => open_sealed(secret, sealed),
        }
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CipherKey::Sym(_) => write!(f, "CipherKey::Sym(..)"),
            CipherKey::Sealed(_) => write!(f, "CipherKey::Sealed(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Cryptographic operation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid Ed25519 signature")]
    InvalidSignature,

    #[error("invalid Ed25519 public key")]
    InvalidPublicKey,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,
}
