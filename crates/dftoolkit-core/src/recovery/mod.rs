/// Deleted-file recovery over a simulated recycle-bin layout
pub mod simulator;

pub use simulator::{DeletedFileRecord, DeletedFileRecoverySimulator, RecoveryReport, DELETED_SUFFIX};
