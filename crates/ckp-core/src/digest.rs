//! Fragment digests.
//!
//! Every key fragment is identified on the wire by a double SHA-256 digest,
//! so that candidates can be compared between hosts without revealing them.

use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

/// A 32-byte double SHA-256 digest of a key fragment.
///
/// Two fragments with identical raw bytes always produce the same digest,
/// which is the only property the matching step relies on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Zeroize)]
pub struct FragmentDigest(pub [u8; 32]);

impl FragmentDigest {
    /// Compute `SHA256(SHA256(data))`.
    pub fn digest(data: &[u8]) -> Self {
        let inner = Sha256::digest(data);
        let outer = Sha256::digest(inner);
        Self(outer.into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero digest (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for FragmentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FragmentDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for FragmentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for FragmentDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for FragmentDigest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let data = b"shaken not stirred";
        let d1 = FragmentDigest::digest(data);
        let d2 = FragmentDigest::digest(data);
        assert_eq!(d1, d2);

        let d3 = FragmentDigest::digest(b"shaken not stirreD");
        assert_ne!(d1, d3);
    }

    #[test]
    fn test_digest_is_double_sha256() {
        let data = b"abc";
        let once = Sha256::digest(data);
        let twice: [u8; 32] = Sha256::digest(once).into();
        assert_eq!(FragmentDigest::digest(data).0, twice);
    }

    #[test]
    fn test_hex_roundtrip() {
        let d = FragmentDigest::from_bytes([0x42; 32]);
        let recovered = FragmentDigest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, recovered);
    }

    #[test]
    fn test_hex_wrong_length_rejected() {
        assert!(FragmentDigest::from_hex("abcd").is_err());
    }
}
