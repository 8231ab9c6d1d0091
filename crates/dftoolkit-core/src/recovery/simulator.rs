/// Locate and restore files carrying a "deleted" marker suffix
///
/// Training images mark removed files by appending a suffix to their name
/// (`report.docx.deleted`). Recovery strips the suffix and copies the data
/// back out, keeping permissions and timestamps intact.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, ToolkitError};
use crate::metadata::ctime;

/// Default marker appended to deleted file names
pub const DELETED_SUFFIX: &str = ".deleted";

/// A deleted file found in the image directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFileRecord {
    /// Path the file had before deletion (marker stripped)
    pub original_path: PathBuf,
    /// Where the marked file currently lives
    pub storage_path: PathBuf,
    pub size: u64,
    /// Modification time of the marked file
    pub deleted_time: DateTime<Utc>,
}

impl DeletedFileRecord {
    /// Name the file is restored under
    pub fn original_name(&self) -> &std::ffi::OsStr {
        self.original_path
            .file_name()
            .unwrap_or_else(|| self.storage_path.as_os_str())
    }

    pub fn describe(&self) -> String {
        format!(
            "Deleted file: {} (size: {} bytes, deleted: {})",
            self.original_path.display(),
            self.size,
            ctime(&self.deleted_time)
        )
    }
}

/// Outcome of a bulk recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub destination: PathBuf,
    pub recovered: Vec<PathBuf>,
    pub total_bytes: u64,
}

/// Scans image directories for deleted files and restores them
#[derive(Debug, Clone)]
pub struct DeletedFileRecoverySimulator {
    deleted_suffix: String,
}

impl Default for DeletedFileRecoverySimulator {
    fn default() -> Self {
        Self::new(DELETED_SUFFIX)
    }
}

impl DeletedFileRecoverySimulator {
    pub fn new(deleted_suffix: impl Into<String>) -> Self {
        Self {
            deleted_suffix: deleted_suffix.into(),
        }
    }

    pub fn deleted_suffix(&self) -> &str {
        &self.deleted_suffix
    }

    /// Walk `image_directory` and collect every marked file
    pub fn scan(&self, image_directory: impl AsRef<Path>) -> Result<Vec<DeletedFileRecord>> {
        let base = image_directory.as_ref();
        if !base.exists() {
            return Err(ToolkitError::missing_path("Image directory", base));
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(original_name) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(self.deleted_suffix.as_str()))
            else {
                continue;
            };
            if original_name.is_empty() {
                tracing::warn!("Skipping {}: no original name", entry.path().display());
                continue;
            }

            let metadata = entry.metadata().map_err(io::Error::from)?;
            let record = DeletedFileRecord {
                original_path: entry.path().with_file_name(original_name),
                storage_path: entry.path().to_path_buf(),
                size: metadata.len(),
                deleted_time: metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default(),
            };
            tracing::debug!("Found deleted file: {}", record.describe());
            records.push(record);
        }

        tracing::info!(
            "Scan of {} found {} deleted file(s)",
            base.display(),
            records.len()
        );
        Ok(records)
    }

    /// Restore every record into `destination`
    pub fn recover(
        &self,
        records: &[DeletedFileRecord],
        destination: impl AsRef<Path>,
    ) -> Result<RecoveryReport> {
        let destination = destination.as_ref();
        fs::create_dir_all(destination)?;

        let mut recovered = Vec::with_capacity(records.len());
        let mut total_bytes = 0u64;
        for record in records {
            let target = destination.join(record.original_name());
            if recovered.contains(&target) {
                tracing::warn!("Overwriting {} recovered earlier", target.display());
            }
            total_bytes += copy_preserving(&record.storage_path, &target)?;
            recovered.push(target);
        }

        tracing::info!(
            "Recovered {} file(s), {} bytes, into {}",
            recovered.len(),
            total_bytes,
            destination.display()
        );
        Ok(RecoveryReport {
            destination: destination.to_path_buf(),
            recovered,
            total_bytes,
        })
    }

    /// Restore one record and return the restored path
    pub fn recover_single(
        &self,
        record: &DeletedFileRecord,
        destination: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let destination = destination.as_ref();
        fs::create_dir_all(destination)?;

        let target = destination.join(record.original_name());
        copy_preserving(&record.storage_path, &target)?;
        tracing::info!("✅ Recovered {}", target.display());
        Ok(target)
    }
}

/// Copy contents and permissions, then carry over access/modify times
fn copy_preserving(source: &Path, target: &Path) -> Result<u64> {
    let bytes = fs::copy(source, target)?;

    let metadata = fs::metadata(source)?;
    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);

    // Read-only copies still accept new times from their owner on Unix
    let handle = if cfg!(unix) {
        File::open(target)?
    } else {
        fs::OpenOptions::new().write(true).open(target)?
    };
    handle.set_times(times)?;
    Ok(bytes)
}
