use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Digest algorithms used by upstream manifests and by our own archives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Hex digest length for this algorithm.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    #[must_use]
    pub fn hasher(self) -> StreamHasher {
        match self {
            Self::Sha1 => StreamHasher::Sha1(Sha1::new()),
            Self::Sha256 => StreamHasher::Sha256(Sha256::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(anyhow::anyhow!("unsupported hash algorithm '{other}'")),
        }
    }
}

/// Incremental hasher over either supported algorithm.
pub enum StreamHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamHasher {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha1(inner) => inner.update(bytes),
            Self::Sha256(inner) => inner.update(bytes),
        }
    }

    #[must_use]
    pub fn finish_hex(self) -> String {
        match self {
            Self::Sha1(inner) => hex::encode(inner.finalize()),
            Self::Sha256(inner) => hex::encode(inner.finalize()),
        }
    }
}

/// An expected digest: algorithm plus lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash {
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

impl Hash {
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into().trim().to_ascii_lowercase(),
        }
    }

    #[must_use]
    pub fn sha1(digest: impl Into<String>) -> Self {
        Self::new(HashAlgorithm::Sha1, digest)
    }

    #[must_use]
    pub fn sha256(digest: impl Into<String>) -> Self {
        Self::new(HashAlgorithm::Sha256, digest)
    }

    /// Parse `algorithm:hex`, e.g. `sha256:ab12..`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (algorithm, digest) = raw
            .split_once(':')
            .with_context(|| format!("hash '{raw}' is missing an algorithm prefix"))?;
        let algorithm: HashAlgorithm = algorithm.parse()?;
        let digest = digest.trim();
        if digest.len() != algorithm.hex_len() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("'{digest}' is not a valid {algorithm} digest");
        }
        Ok(Self::new(algorithm, digest))
    }

    /// Case-insensitive comparison against a computed hex digest.
    #[must_use]
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.digest.eq_ignore_ascii_case(actual_hex.trim())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    let mut hasher = algorithm.hasher();
    hasher.update(bytes);
    hasher.finish_hex()
}

pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0_u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finish_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha1, b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn matches_ignores_case() {
        let hash = Hash::sha1("A9993E364706816ABA3E25717850C26C9CD0D89D");
        assert!(hash.matches("a9993e364706816aba3e25717850c26c9cd0d89d"));
        assert!(!hash.matches("a9993e364706816aba3e25717850c26c9cd0d89e"));
    }

    #[test]
    fn parse_rejects_bad_length() {
        assert!(Hash::parse("sha1:abcd").is_err());
        assert!(Hash::parse("md5:abcd").is_err());
        let parsed = Hash::parse("sha1:a9993e364706816aba3e25717850c26c9cd0d89d").unwrap();
        assert_eq!(parsed.algorithm, HashAlgorithm::Sha1);
    }

    #[test]
    fn hash_file_streams_contents() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("blob");
        std::fs::write(&path, b"abc")?;
        assert_eq!(
            hash_file(HashAlgorithm::Sha256, &path)?,
            hash_bytes(HashAlgorithm::Sha256, b"abc")
        );
        Ok(())
    }
}
