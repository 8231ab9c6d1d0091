/// Integrity and chain-of-custody features
pub mod clock;
pub mod evidence;
pub mod hashing;

pub use clock::{Clock, ManualClock, SystemClock};

pub use evidence::{
    CustodyEntry, EvidenceItem, EvidenceLedger, EvidenceRecord, REGISTRATION_ACTION,
    REGISTRATION_NOTES, SYSTEM_ACTOR,
};

pub use hashing::{HashAlgorithm, HashDigestSet, HashEngine, VerificationMap, DEFAULT_BUFFER_SIZE};
