//! Artifact content hashes
//!
//! A [`ContentHash`] is the Blake3 digest of an artifact's encoded bytes.
//! Two artifacts with equal hashes were emitted byte-for-byte the same.

use std::fmt::{self, Display, Formatter};

/// Blake3 digest of encoded artifact bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    #[must_use]
    pub fn compute(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Whether `bytes` hash to this value
    #[inline]
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        *self == Self::compute(bytes)
    }

    /// First eight bytes as hex, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Reports carry the hex form
impl serde::Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_equal_hash() {
        let encoded = br#"{"name":"com.example.Foo"}"#;
        assert_eq!(ContentHash::compute(encoded), ContentHash::compute(encoded));
        assert_ne!(ContentHash::compute(b"a"), ContentHash::compute(b"b"));
        assert!(ContentHash::compute(encoded).matches(encoded));
    }

    #[test]
    fn short_form_prefixes_full_form() {
        let hash = ContentHash::compute(b"Foo");
        assert_eq!(hash.to_string().len(), 64);
        assert!(hash.to_string().starts_with(&hash.short()));
    }

    #[test]
    fn serializes_as_hex_string() {
        let hash = ContentHash::compute(b"Foo");
        assert_eq!(serde_json::to_string(&hash).unwrap(), format!("\"{hash}\""));
    }
}
