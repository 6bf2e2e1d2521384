//! Fixed-width binary identifiers.
//!
//! Keys, digests and account identifiers are all plain byte arrays that are
//! printed as upper-case hex and serialized as hex strings so fixture files
//! stay readable.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(TypeError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            /// Create from a raw byte array.
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Copy from a slice, failing on a length mismatch.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
                if bytes.len() != $len {
                    return Err(TypeError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    });
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(bytes);
                Ok(Self(arr))
            }

            /// The raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Upper-case hex representation.
            pub fn to_hex(&self) -> String {
                hex::encode_upper(self.0)
            }

            /// Parse from a hex string (either case).
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode_upper(&self.0[..4]))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// A 256-bit position in the ordered state key space.
    ///
    /// Ordering is lexicographic over the raw bytes.
    Key,
    32
);

fixed_bytes!(
    /// A 256-bit hash: state/transaction digests, ledger hashes, transaction
    /// hashes and NFT token identifiers.
    Hash256,
    32
);

fixed_bytes!(
    /// A 160-bit account identifier.
    AccountId,
    20
);

/// Serde helper for opaque byte blobs stored as hex strings.
pub mod hex_blob {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_is_upper_case() {
        let h = Hash256::new([0xab; 32]);
        let hex = h.to_hex();
        assert!(hex.starts_with("ABAB"));
        assert_eq!(Hash256::from_hex(&hex.to_lowercase()).unwrap(), h);
    }

    #[test]
    fn wrong_length_rejected() {
        let err = AccountId::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
        assert!(Hash256::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn invalid_hex_rejected() {
        assert!(matches!(
            Hash256::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn serde_as_hex_string() {
        let a = AccountId::new([1; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(20)));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn debug_is_short() {
        let h = Hash256::new([0xff; 32]);
        assert_eq!(format!("{h:?}"), "Hash256(FFFFFFFF)");
    }
}
