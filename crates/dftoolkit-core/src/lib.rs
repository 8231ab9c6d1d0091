//! Digital forensics helper utilities
//!
//! The integrity core is [`forensics`]: multi-algorithm hashing and an
//! append-only evidence ledger with chain-of-custody logging. The remaining
//! modules map local artefacts (files, directory trees, registry exports,
//! memory dumps) to plain records.

pub mod config;
pub mod error;
pub mod forensics;
pub mod memory;
pub mod metadata;
pub mod recovery;
pub mod registry;
pub mod timeline;

pub use config::ToolkitConfig;
pub use error::{Result, ToolkitError};

pub use forensics::{
    Clock, CustodyEntry, EvidenceItem, EvidenceLedger, EvidenceRecord, HashAlgorithm,
    HashDigestSet, HashEngine, ManualClock, SystemClock, VerificationMap,
};

pub use memory::{DumpSummary, MemoryDumpAnalyzer, MemoryString};
pub use metadata::{FileMetadata, FileMetadataExtractor, ReadableMetadata};
pub use recovery::{DeletedFileRecord, DeletedFileRecoverySimulator, RecoveryReport};
pub use registry::{RegistryValue, WindowsRegistryParser};
pub use timeline::{TimelineAnalyzer, TimelineEvent, TimelineEventType, TimelineStatistics};
