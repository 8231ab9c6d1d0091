//! File metadata extraction
//!
//! Maps a path on disk to a [`FileMetadata`] record: size, timestamps,
//! an `ls`-style permission string and a MIME type guessed from the
//! file extension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, ToolkitError};

/// Metadata fields common to every file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub size: u64,
    /// Inode change time on Unix, creation time elsewhere
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    pub permissions: String,
    pub mime_type: Option<String>,
}

/// String-only rendering of [`FileMetadata`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadableMetadata {
    pub path: String,
    pub size: String,
    pub created: String,
    pub modified: String,
    pub accessed: String,
    pub permissions: String,
    pub mime_type: String,
}

impl FileMetadata {
    pub fn readable(&self) -> ReadableMetadata {
        ReadableMetadata {
            path: self.path.display().to_string(),
            size: format!("{} bytes", self.size),
            created: ctime(&self.created),
            modified: ctime(&self.modified),
            accessed: ctime(&self.accessed),
            permissions: self.permissions.clone(),
            mime_type: self
                .mime_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// `Mon Mar  4 09:15:00 2024`
pub fn ctime(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Extracts [`FileMetadata`] from the file system
#[derive(Debug, Clone, Default)]
pub struct FileMetadataExtractor {
    follow_symlinks: bool,
}

impl FileMetadataExtractor {
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }

    pub fn follows_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    pub fn extract(&self, path: impl AsRef<Path>) -> Result<FileMetadata> {
        let path = path.as_ref();
        let metadata = if self.follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolkitError::missing_path("File", path),
            _ => e.into(),
        })?;

        let resolved = if self.follow_symlinks {
            path.canonicalize()?
        } else {
            absolute_without_following(path)?
        };

        tracing::debug!("Extracted metadata for {}", resolved.display());
        Ok(FileMetadata {
            mime_type: guess_mime_type(&resolved).map(String::from),
            path: resolved,
            size: metadata.len(),
            created: change_time(&metadata),
            modified: system_time(metadata.modified()),
            accessed: system_time(metadata.accessed()),
            permissions: permission_string(&metadata),
        })
    }
}

/// Canonicalize the parent but keep a trailing symlink unresolved
fn absolute_without_following(path: &Path) -> Result<PathBuf> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            Ok(parent.canonicalize()?.join(name))
        }
        (_, Some(name)) => Ok(std::env::current_dir()?.join(name)),
        _ => Ok(path.canonicalize()?),
    }
}

fn system_time(time: std::io::Result<SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from)
        .unwrap_or_default()
}

#[cfg(unix)]
fn change_time(metadata: &fs::Metadata) -> DateTime<Utc> {
    use std::os::unix::fs::MetadataExt;
    DateTime::<Utc>::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)
        .unwrap_or_default()
}

#[cfg(not(unix))]
fn change_time(metadata: &fs::Metadata) -> DateTime<Utc> {
    system_time(metadata.created())
}

/// `drwxr-xr-x` style mode string
#[cfg(unix)]
pub fn permission_string(metadata: &fs::Metadata) -> String {
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};

    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        'd'
    } else if file_type.is_symlink() {
        'l'
    } else if file_type.is_block_device() {
        'b'
    } else if file_type.is_char_device() {
        'c'
    } else if file_type.is_fifo() {
        'p'
    } else if file_type.is_socket() {
        's'
    } else {
        '-'
    };

    let mode = metadata.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(kind);

    // (read, write, exec, special bit, special char when exec set, when not)
    let triads = [
        (0o400, 0o200, 0o100, 0o4000, 's', 'S'),
        (0o040, 0o020, 0o010, 0o2000, 's', 'S'),
        (0o004, 0o002, 0o001, 0o1000, 't', 'T'),
    ];
    for (r, w, x, special, with_exec, without_exec) in triads {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        out.push(match (mode & x != 0, mode & special != 0) {
            (true, true) => with_exec,
            (false, true) => without_exec,
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    out
}

#[cfg(not(unix))]
pub fn permission_string(metadata: &fs::Metadata) -> String {
    let kind = if metadata.is_dir() { 'd' } else { '-' };
    let bits = if metadata.permissions().readonly() {
        "r--r--r--"
    } else {
        "rw-rw-rw-"
    };
    format!("{kind}{bits}")
}

/// Guess a MIME type from the file extension
pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        // Text
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "md" => "text/markdown",
        "xml" => "application/xml",
        "json" => "application/json",
        "js" => "text/javascript",
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        // Audio / video
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "rtf" => "application/rtf",
        // Archives
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        // Executables and system artefacts
        "exe" | "dll" => "application/x-msdownload",
        "sh" => "application/x-sh",
        "py" => "text/x-python",
        "sqlite" | "db" => "application/vnd.sqlite3",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_extract_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, b"twelve bytes").unwrap();

        let metadata = FileMetadataExtractor::default().extract(&path).unwrap();
        assert_eq!(metadata.size, 12);
        assert_eq!(metadata.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(metadata.path, path.canonicalize().unwrap());
        assert!(metadata.permissions.starts_with('-'));
        assert_eq!(metadata.permissions.len(), 10);
    }

    #[test]
    fn test_extract_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileMetadataExtractor::default()
            .extract(temp_dir.path().join("absent.bin"))
            .unwrap_err();
        assert!(matches!(err, ToolkitError::NotFound { .. }));
    }

    #[test]
    fn test_extract_directory() {
        let temp_dir = TempDir::new().unwrap();
        let metadata = FileMetadataExtractor::default()
            .extract(temp_dir.path())
            .unwrap();
        assert!(metadata.permissions.starts_with('d'));
        assert!(metadata.mime_type.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_string_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("script.sh");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o754)).unwrap();

        let metadata = FileMetadataExtractor::default().extract(&path).unwrap();
        assert_eq!(metadata.permissions, "-rwxr-xr--");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_policy() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.pdf");
        fs::write(&target, vec![0u8; 64]).unwrap();
        let link = temp_dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let own = FileMetadataExtractor::new(false).extract(&link).unwrap();
        assert!(own.permissions.starts_with('l'));
        assert_eq!(own.mime_type.as_deref(), Some("text/plain"));

        let followed = FileMetadataExtractor::new(true).extract(&link).unwrap();
        assert_eq!(followed.size, 64);
        assert_eq!(followed.mime_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_readable_rendering() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap();
        let metadata = FileMetadata {
            path: PathBuf::from("/evidence/blob"),
            size: 2048,
            created: instant,
            modified: instant,
            accessed: instant,
            permissions: "-rw-r--r--".to_string(),
            mime_type: None,
        };

        let readable = metadata.readable();
        assert_eq!(readable.size, "2048 bytes");
        assert_eq!(readable.modified, "Mon Mar  4 09:15:00 2024");
        assert_eq!(readable.mime_type, "unknown");
    }

    #[test]
    fn test_guess_mime_type_is_case_insensitive() {
        assert_eq!(guess_mime_type(Path::new("IMG_0001.JPG")), Some("image/jpeg"));
        assert_eq!(guess_mime_type(Path::new("archive.tar")), Some("application/x-tar"));
        assert_eq!(guess_mime_type(Path::new("README")), None);
        assert_eq!(guess_mime_type(Path::new("data.unknownext")), None);
    }
}
