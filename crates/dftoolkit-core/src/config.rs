//! Toolkit-wide tunables
//!
//! Every component can be built directly, but callers that want a single
//! place to adjust buffer sizes and markers go through [`ToolkitConfig`].

use std::path::PathBuf;

use crate::forensics::hashing::{HashEngine, DEFAULT_BUFFER_SIZE};
use crate::memory::{MemoryDumpAnalyzer, DEFAULT_MIN_LENGTH};
use crate::metadata::FileMetadataExtractor;
use crate::recovery::{DeletedFileRecoverySimulator, DELETED_SUFFIX};

/// Configuration shared by the toolkit components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolkitConfig {
    /// Read buffer used while hashing
    pub hash_buffer_size: usize,

    /// Marker suffix identifying simulated deleted files
    pub deleted_suffix: String,

    /// Shortest printable run reported by the string scanner
    pub min_string_length: usize,

    /// Whether metadata extraction resolves symbolic links
    pub follow_symlinks: bool,

    /// Where recovered files land when no destination is given
    pub recovery_destination: PathBuf,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            hash_buffer_size: DEFAULT_BUFFER_SIZE,
            deleted_suffix: DELETED_SUFFIX.to_string(),
            min_string_length: DEFAULT_MIN_LENGTH,
            follow_symlinks: false,
            recovery_destination: PathBuf::from("recovered"),
        }
    }
}

impl ToolkitConfig {
    pub fn with_hash_buffer_size(mut self, size: usize) -> Self {
        self.hash_buffer_size = size;
        self
    }

    pub fn with_deleted_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.deleted_suffix = suffix.into();
        self
    }

    pub fn with_min_string_length(mut self, length: usize) -> Self {
        self.min_string_length = length;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_recovery_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.recovery_destination = destination.into();
        self
    }

    pub fn hash_engine(&self) -> HashEngine {
        HashEngine::new(self.hash_buffer_size)
    }

    pub fn metadata_extractor(&self) -> FileMetadataExtractor {
        FileMetadataExtractor::new(self.follow_symlinks)
    }

    pub fn recovery_simulator(&self) -> DeletedFileRecoverySimulator {
        DeletedFileRecoverySimulator::new(self.deleted_suffix.clone())
    }

    pub fn memory_analyzer(&self) -> MemoryDumpAnalyzer {
        MemoryDumpAnalyzer::new(self.min_string_length)
    }
}
