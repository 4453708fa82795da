//! Strong types for byte arrays
//!
//! Semantic newtypes for the fixed-size byte arrays that flow through the
//! replication core, replacing raw `[u8; N]`.

use std::fmt;

/// Macro to define fixed-size byte arrays with strong types.
///
/// Args:
/// - $name: The name of the struct (e.g., Hash)
/// - $len: The size of the array (e.g., 32)
/// - $doc: Documentation string
/// - $derives: List of traits to derive
macro_rules! define_bytes {
    ($name:ident, $len:expr, $doc:expr, [$($derives:ident),*]) => {
        #[doc = $doc]
        #[derive(Clone, Copy, serde::Serialize, serde::Deserialize, borsh::BorshSerialize, borsh::BorshDeserialize, $($derives),*)]
        #[repr(transparent)]
        pub struct $name(#[serde(with = "serde_bytes")] pub [u8; $len]);

        impl $name {
            /// Returns the inner bytes as a slice.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Parse from a hex string.
            pub fn from_hex(hex_str: &str) -> Result<Self, String> {
                let bytes = hex::decode(hex_str)
                    .map_err(|e| format!("invalid hex: {}", e))?;
                if bytes.len() != $len {
                    return Err(format!(
                        "expected {} hex characters, got {}",
                        $len * 2,
                        hex_str.len()
                    ));
                }
                Ok(Self(bytes.try_into().map_err(|_| "internal error: length mismatch".to_string())?))
            }
        }

        // Standard Conversions
        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(wrapper: $name) -> [u8; $len] {
                wrapper.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = [u8; $len];
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        // Zero-allocation Hex formatting
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(self, f)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                fmt::Display::fmt(self, f)?;
                write!(f, ")")
            }
        }

        // TryFrom for slice parsing (for from_bytes)
        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;
            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                Ok(Self(<[u8; $len]>::try_from(slice)?))
            }
        }

        // TryFrom<Vec<u8>> for owned vector parsing
        impl TryFrom<Vec<u8>> for $name {
            type Error = Vec<u8>;
            fn try_from(vec: Vec<u8>) -> Result<Self, Self::Error> {
                if vec.len() != $len {
                    return Err(vec);
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(&vec);
                Ok(Self(arr))
            }
        }
    };
}

// --- Type Definitions ---

define_bytes!(
    Hash,
    32,
    "32-byte hash (BLAKE3)",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);
}

define_bytes!(
    Cid,
    32,
    "Content id of a record: the BLAKE3 hash of its sealed envelope bytes",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

define_bytes!(
    PubKey,
    32,
    "32-byte Ed25519 public key",
    [PartialEq, Eq, Hash, Default, PartialOrd, Ord]
);

define_bytes!(
    SymKey,
    32,
    "32-byte XChaCha20-Poly1305 symmetric key (follow or read key)",
    [PartialEq, Eq, Hash]
);

define_bytes!(
    Signature,
    64,
    "64-byte Ed25519 signature",
    [PartialEq, Eq]
);

define_bytes!(
    LogId,
    32,
    "Identifier of one writer's log within a thread, bound to the log's signing key",
    [PartialEq, Eq, Hash, PartialOrd, Ord]
);

define_bytes!(
    PeerId,
    32,
    "Identifier of a host peer, bound to its signing key",
    [PartialEq, Eq, Hash, PartialOrd, Ord]
);

impl LogId {
    /// Derive the id that is bound to a log signing key.
    pub fn from_public_key(pk: &PubKey) -> Self {
        Self(pk.0)
    }

    /// Whether this id is cryptographically bound to the given public key.
    /// Every accepted log descriptor must satisfy this.
    pub fn matches(&self, pk: &PubKey) -> bool {
        self.0 == pk.0
    }
}

impl PeerId {
    /// Derive the id that is bound to a host signing key.
    pub fn from_public_key(pk: &PubKey) -> Self {
        Self(pk.0)
    }

    /// Whether this id is cryptographically bound to the given public key.
    pub fn matches(&self, pk: &PubKey) -> bool {
        self.0 == pk.0
    }
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_display() {
        let hash = Hash([0xab; 32]);
        let expected = "abababababababababababababababababababababababababababababababab";
        assert_eq!(format!("{}", hash), expected);
        assert_eq!(format!("{:?}", hash), format!("Hash({})", expected));
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature([0xef; 64]);
        let expected = "ef".repeat(64);
        assert_eq!(format!("{}", sig), expected);
    }

    #[test]
    fn test_traits() {
        let bytes = [1u8; 32];
        let cid: Cid = bytes.into();
        assert_eq!(*cid, bytes); // Test Deref
        assert_eq!(cid.as_bytes(), &bytes);
    }

    #[test]
    fn test_from_into() {
        let bytes: [u8; 32] = [1; 32];
        let key: PubKey = bytes.into();
        let back: [u8; 32] = key.into();
        assert_eq!(bytes, back);
    }

    #[test]
    fn test_log_id_matches() {
        let pk = PubKey([7u8; 32]);
        let lid = LogId::from_public_key(&pk);
        assert!(lid.matches(&pk));
        assert!(!lid.matches(&PubKey([8u8; 32])));
    }
}
