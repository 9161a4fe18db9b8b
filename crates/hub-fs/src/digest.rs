//! SHA-256 content digests
//!
//! A [`Digest`] fingerprints a byte blob by its length and SHA-256 hash. Two
//! digests are equal iff the underlying bytes are identical. The canonical
//! text form is `sha256:<hex>:<len>`, which is what the registry stores.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::{Error, Result};

/// Prefix for all digests produced by this module
const PREFIX: &str = "sha256:";

/// Length of a hex-encoded SHA-256 hash
const HEX_LEN: usize = 64;

/// Fixed-width content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    hex: String,
    len: u64,
}

impl Digest {
    /// Compute the digest of an in-memory blob.
    pub fn of(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Self {
            hex: format!("{:x}", hash),
            len: bytes.len() as u64,
        }
    }

    /// Lowercase hex of the SHA-256 hash.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Size of the fingerprinted content in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First 12 hex characters, for log lines and status tables.
    pub fn short(&self) -> &str {
        &self.hex[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", PREFIX, self.hex, self.len)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidDigest {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let body = s.strip_prefix(PREFIX).ok_or_else(|| invalid("missing sha256: prefix"))?;
        let (hex, len) = body.split_once(':').ok_or_else(|| invalid("missing length"))?;

        if hex.len() != HEX_LEN || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(invalid("hash must be 64 lowercase hex characters"));
        }
        let len = len.parse::<u64>().map_err(|_| invalid("length is not a number"))?;

        Ok(Self {
            hex: hex.to_string(),
            len,
        })
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the digest of an in-memory blob.
pub fn digest(bytes: &[u8]) -> Digest {
    Digest::of(bytes)
}

/// Compute the digest of a file, streaming its contents.
///
/// Returns `Ok(None)` when the file does not exist, including when an
/// ancestor is a regular file; any other read failure is an error.
pub fn digest_file(path: &Path) -> Result<Option<Digest>> {
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };

    let mut hasher = Sha256::new();
    let len = io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(Some(Digest {
        hex: format!("{:x}", hasher.finalize()),
        len,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest(b"test"), digest(b"test"));
    }

    #[test]
    fn different_content_different_digest() {
        assert_ne!(digest(b"aaa"), digest(b"bbb"));
    }

    #[test]
    fn digest_known_value() {
        assert_eq!(
            digest(b"hello world").to_string(),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9:11"
        );
    }

    #[test]
    fn file_digest_matches_content_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "hello world").unwrap();

        assert_eq!(digest_file(&path).unwrap(), Some(digest(b"hello world")));
    }

    #[test]
    fn missing_file_has_no_digest() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(digest_file(&dir.path().join("absent")).unwrap(), None);
    }

    #[test]
    fn path_under_a_regular_file_has_no_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain"), "x").unwrap();
        assert_eq!(digest_file(&dir.path().join("plain").join("child")).unwrap(), None);
    }

    #[test]
    fn directory_is_an_error_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(digest_file(dir.path()).is_err());
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!("md5:abc:1".parse::<Digest>().is_err());
        assert!("sha256:abc:1".parse::<Digest>().is_err());
        let upper = format!("sha256:{}:1", "A".repeat(64));
        assert!(upper.parse::<Digest>().is_err());
        let no_len = format!("sha256:{}", "a".repeat(64));
        assert!(no_len.parse::<Digest>().is_err());
    }

    #[test]
    fn text_form_parses_back() {
        let d = digest(b"round");
        assert_eq!(d.to_string().parse::<Digest>().unwrap(), d);
    }
}
