//! Raw memory dump helpers
//!
//! Dumps are memory-mapped rather than read, so multi-gigabyte captures can be
//! scanned without loading them into the heap.

use memmap2::{Mmap, MmapOptions};
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::error::{Result, ToolkitError};

/// Shortest printable run reported by default
pub const DEFAULT_MIN_LENGTH: usize = 4;

/// Largest repetition count compiled into the run pattern; longer minimums
/// are enforced on the match length
const MAX_PATTERN_REPEAT: usize = 1024;

/// A printable ASCII run and where it starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryString {
    pub offset: usize,
    pub value: String,
}

/// Quick overview of a dump file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpSummary {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Mapped dump contents; zero-length files cannot be mapped
enum DumpBytes {
    Empty,
    Mapped(Mmap),
}

impl Deref for DumpBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DumpBytes::Empty => &[],
            DumpBytes::Mapped(mmap) => &mmap[..],
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDumpAnalyzer {
    min_length: usize,
}

impl Default for MemoryDumpAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LENGTH)
    }
}

impl MemoryDumpAnalyzer {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length: min_length.max(1),
        }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Maximal runs of printable ASCII (0x20..=0x7E) of at least `min_length` bytes
    ///
    /// `limit` of `None` or `Some(0)` returns every run.
    pub fn extract_ascii_strings(
        &self,
        dump_path: impl AsRef<Path>,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryString>> {
        let data = open_dump(dump_path.as_ref())?;
        let repeat = self.min_length.min(MAX_PATTERN_REPEAT);
        let printable = Regex::new(&format!("(?-u:[ -~]){{{},}}", repeat))?;
        let limit = limit.filter(|&n| n > 0).unwrap_or(usize::MAX);

        let strings: Vec<MemoryString> = printable
            .find_iter(&data)
            .filter(|m| m.len() >= self.min_length)
            .take(limit)
            .map(|m| MemoryString {
                offset: m.start(),
                // The class only admits ASCII
                value: String::from_utf8_lossy(m.as_bytes()).into_owned(),
            })
            .collect();

        tracing::debug!(
            "Extracted {} string(s) from {} byte dump",
            strings.len(),
            data.len()
        );
        Ok(strings)
    }

    /// Every offset where `pattern` occurs, overlaps included
    pub fn search(&self, dump_path: impl AsRef<Path>, pattern: &[u8]) -> Result<Vec<usize>> {
        let data = open_dump(dump_path.as_ref())?;
        if pattern.is_empty() || pattern.len() > data.len() {
            return Ok(Vec::new());
        }

        Ok(data
            .windows(pattern.len())
            .enumerate()
            .filter(|(_, window)| *window == pattern)
            .map(|(offset, _)| offset)
            .collect())
    }

    pub fn summary(&self, dump_path: impl AsRef<Path>) -> Result<DumpSummary> {
        let path = dump_path.as_ref();
        if !path.exists() {
            return Err(ToolkitError::missing_path("Memory dump", path));
        }
        Ok(DumpSummary {
            path: path.canonicalize()?,
            size_bytes: std::fs::metadata(path)?.len(),
        })
    }
}

fn open_dump(path: &Path) -> Result<DumpBytes> {
    if !path.exists() {
        return Err(ToolkitError::missing_path("Memory dump", path));
    }

    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(DumpBytes::Empty);
    }
    // Safety: the dump is treated as read-only evidence for the lifetime of the map
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    Ok(DumpBytes::Mapped(mmap))
}
