/// Multi-algorithm hashing for evidentiary verification
///
/// Every digest set is produced from a single streaming pass, so the MD5,
/// SHA-1 and SHA-256 values always describe the same bytes.
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, ToolkitError};

/// Default read buffer (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Supported hash algorithms, ordered as they are reported
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Get all algorithms
    pub fn all() -> [Self; 3] {
        [Self::Md5, Self::Sha1, Self::Sha256]
    }

    /// Get algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Lowercase key used in JSON output
    pub fn key(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unsupported hash algorithm: {other}")),
        }
    }
}

/// Digests of one file, one per algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigestSet {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl HashDigestSet {
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }

    /// Digests in report order
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, &str)> + '_ {
        HashAlgorithm::all().into_iter().map(move |a| (a, self.get(a)))
    }
}

/// Running accumulators for the three algorithms
struct DigestAccumulator {
    md5: md5::Context,
    sha1: Sha1,
    sha256: Sha256,
}

impl DigestAccumulator {
    fn new() -> Self {
        Self {
            md5: md5::Context::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        self.md5.consume(chunk);
        self.sha1.update(chunk);
        self.sha256.update(chunk);
    }

    fn finish(self) -> HashDigestSet {
        HashDigestSet {
            md5: format!("{:x}", self.md5.compute()),
            sha1: format!("{:x}", self.sha1.finalize()),
            sha256: format!("{:x}", self.sha256.finalize()),
        }
    }
}

/// Per-algorithm verification outcome
pub type VerificationMap = BTreeMap<HashAlgorithm, bool>;

/// Streaming hash calculator
#[derive(Debug, Clone)]
pub struct HashEngine {
    buffer_size: usize,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl HashEngine {
    /// Create an engine reading `buffer_size` bytes per chunk
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Stream a reader through every algorithm, returning digests and byte count
    fn digest_reader(&self, mut reader: impl Read) -> Result<(HashDigestSet, u64)> {
        let mut accumulator = DigestAccumulator::new();
        let mut buffer = vec![0; self.buffer_size];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            accumulator.update(&buffer[..n]);
            total += n as u64;
        }
        Ok((accumulator.finish(), total))
    }

    /// Calculate all digests for a file in one pass
    pub fn calculate(&self, path: impl AsRef<Path>) -> Result<HashDigestSet> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ToolkitError::missing_path("File", path));
        }

        let file = File::open(path)?;
        let (digests, total) = self.digest_reader(file)?;
        tracing::debug!(
            "Hashed {} ({} bytes, sha256 {})",
            path.display(),
            total,
            digests.sha256
        );
        Ok(digests)
    }

    /// Calculate all digests for an in-memory buffer
    pub fn calculate_bytes(&self, data: &[u8]) -> HashDigestSet {
        let mut accumulator = DigestAccumulator::new();
        for chunk in data.chunks(self.buffer_size) {
            accumulator.update(chunk);
        }
        accumulator.finish()
    }

    /// Verify a file against expected digests
    ///
    /// An algorithm with no expected digest is reported as a mismatch.
    pub fn verify(
        &self,
        path: impl AsRef<Path>,
        expected: &BTreeMap<HashAlgorithm, String>,
    ) -> Result<VerificationMap> {
        let actual = self.calculate(path)?;
        Ok(actual
            .iter()
            .map(|(algorithm, digest)| {
                let matched = expected
                    .get(&algorithm)
                    .is_some_and(|e| e.eq_ignore_ascii_case(digest));
                (algorithm, matched)
            })
            .collect())
    }

    /// Render a verification map as `MD5: match, SHA1: mismatch, ...`
    pub fn summarize(verification: &VerificationMap) -> String {
        verification
            .iter()
            .map(|(algorithm, ok)| {
                format!("{}: {}", algorithm.name(), if *ok { "match" } else { "mismatch" })
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
