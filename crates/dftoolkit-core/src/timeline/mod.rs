/// Timeline reconstruction from file system timestamps
///
/// Walks a directory tree and turns every file's timestamps into events,
/// which can be merged with caller-supplied events and exported in
/// chronological order.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, ToolkitError};
use crate::metadata::ctime;

/// What happened at a timeline instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineEventType {
    FileCreated,
    FileModified,
    FileAccessed,
    /// Supplied by the caller rather than read from the file system
    Custom,
}

/// A single point in time for an artefact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: TimelineEventType,
    pub description: String,
    pub source: PathBuf,
}

impl TimelineEvent {
    /// Caller-supplied event
    pub fn custom(
        timestamp: DateTime<Utc>,
        description: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            timestamp,
            event_type: TimelineEventType::Custom,
            description: description.into(),
            source: source.into(),
        }
    }

    /// `{ctime} - {description} ({source})`
    pub fn formatted(&self) -> String {
        format!(
            "{} - {} ({})",
            ctime(&self.timestamp),
            self.description,
            self.source.display()
        )
    }
}

/// Summary of the collected events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStatistics {
    pub total_events: usize,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub events_by_type: HashMap<TimelineEventType, usize>,
}

/// Accumulates timeline events
#[derive(Debug, Clone, Default)]
pub struct TimelineAnalyzer {
    events: Vec<TimelineEvent>,
}

impl TimelineAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, event: TimelineEvent) {
        self.events.push(event);
    }

    pub fn add_events(&mut self, events: impl IntoIterator<Item = TimelineEvent>) {
        self.events.extend(events);
    }

    /// Generate events for every regular file below `directory`
    ///
    /// Each file yields a creation and a modification event, plus an access
    /// event when `include_access_times` is set. The generated events are
    /// added to the analyzer and also returned.
    pub fn build_from_directory(
        &mut self,
        directory: impl AsRef<Path>,
        include_access_times: bool,
    ) -> Result<Vec<TimelineEvent>> {
        let base = directory.as_ref();
        if !base.exists() {
            return Err(ToolkitError::missing_path("Directory", base));
        }

        let mut generated = Vec::new();
        for entry in WalkDir::new(base).follow_links(true).sort_by_file_name() {
            // Dangling links and link loops are skipped, not fatal
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let (metadata, source) = match entry
                .metadata()
                .map_err(io::Error::from)
                .and_then(|metadata| Ok((metadata, entry.path().canonicalize()?)))
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy();

            let mut push = |timestamp, event_type, verb: &str| {
                generated.push(TimelineEvent {
                    timestamp,
                    event_type,
                    description: format!("{verb} {name}"),
                    source: source.clone(),
                });
            };

            push(created_time(&metadata), TimelineEventType::FileCreated, "Created");
            push(
                to_utc(metadata.modified()),
                TimelineEventType::FileModified,
                "Modified",
            );
            if include_access_times {
                push(
                    to_utc(metadata.accessed()),
                    TimelineEventType::FileAccessed,
                    "Accessed",
                );
            }
        }

        tracing::info!(
            "Built {} timeline event(s) from {}",
            generated.len(),
            base.display()
        );
        self.add_events(generated.iter().cloned());
        Ok(generated)
    }

    /// Events, optionally sorted by timestamp (stable for ties)
    pub fn export(&self, chronological: bool) -> Vec<TimelineEvent> {
        let mut events = self.events.clone();
        if chronological {
            events.sort_by_key(|e| e.timestamp);
        }
        events
    }

    pub fn as_strings(&self, chronological: bool) -> Vec<String> {
        self.export(chronological)
            .iter()
            .map(TimelineEvent::formatted)
            .collect()
    }

    pub fn statistics(&self) -> TimelineStatistics {
        let mut events_by_type = HashMap::new();
        for event in &self.events {
            *events_by_type.entry(event.event_type).or_insert(0) += 1;
        }

        TimelineStatistics {
            total_events: self.events.len(),
            first_event: self.events.iter().map(|e| e.timestamp).min(),
            last_event: self.events.iter().map(|e| e.timestamp).max(),
            events_by_type,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn to_utc(time: io::Result<std::time::SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from).unwrap_or_default()
}

#[cfg(unix)]
fn created_time(metadata: &fs::Metadata) -> DateTime<Utc> {
    use std::os::unix::fs::MetadataExt;
    DateTime::<Utc>::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)
        .unwrap_or_default()
}

#[cfg(not(unix))]
fn created_time(metadata: &fs::Metadata) -> DateTime<Utc> {
    to_utc(metadata.created())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::fs::{File, FileTimes};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
    }

    fn set_times(path: &Path, modified: DateTime<Utc>, accessed: DateTime<Utc>) {
        let times = FileTimes::new()
            .set_modified(SystemTime::from(modified))
            .set_accessed(SystemTime::from(accessed));
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_times(times)
            .unwrap();
    }

    #[test]
    fn test_build_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();
        fs::write(temp_dir.path().join("sub/b.log"), b"b").unwrap();

        let mut analyzer = TimelineAnalyzer::new();
        let events = analyzer.build_from_directory(temp_dir.path(), false).unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(analyzer.len(), 4);
        assert!(events.iter().any(|e| e.description == "Created a.txt"));
        assert!(events.iter().any(|e| e.description == "Modified b.log"));
        assert!(events
            .iter()
            .all(|e| e.event_type != TimelineEventType::FileAccessed));
        assert!(events.iter().all(|e| e.source.is_absolute()));
    }

    #[test]
    fn test_include_access_times() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"a").unwrap();
        let accessed = base_time() + Duration::days(3);
        set_times(&path, base_time(), accessed);

        let mut analyzer = TimelineAnalyzer::new();
        let events = analyzer.build_from_directory(temp_dir.path(), true).unwrap();

        assert_eq!(events.len(), 3);
        let access = events
            .iter()
            .find(|e| e.event_type == TimelineEventType::FileAccessed)
            .unwrap();
        assert_eq!(access.timestamp, accessed);
        assert_eq!(access.description, "Accessed a.txt");
    }

    #[test]
    fn test_chronological_export() {
        let temp_dir = TempDir::new().unwrap();
        let older = temp_dir.path().join("older.txt");
        let newer = temp_dir.path().join("newer.txt");
        fs::write(&older, b"1").unwrap();
        fs::write(&newer, b"2").unwrap();
        set_times(&older, base_time(), base_time());
        set_times(&newer, base_time() + Duration::hours(1), base_time());

        let mut analyzer = TimelineAnalyzer::new();
        analyzer.add_event(TimelineEvent::custom(
            base_time() - Duration::days(1),
            "Suspect logged in",
            "/var/log/auth.log",
        ));
        analyzer.build_from_directory(temp_dir.path(), false).unwrap();

        let sorted = analyzer.export(true);
        assert!(sorted.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(sorted[0].description, "Suspect logged in");

        let modified: Vec<_> = sorted
            .iter()
            .filter(|e| e.event_type == TimelineEventType::FileModified)
            .map(|e| e.description.as_str())
            .collect();
        assert_eq!(modified, vec!["Modified older.txt", "Modified newer.txt"]);

        // Unsorted export keeps insertion order
        assert_eq!(analyzer.export(false)[0].event_type, TimelineEventType::Custom);
    }

    #[test]
    fn test_formatted_line() {
        let event = TimelineEvent::custom(base_time(), "USB inserted", "/dev/sdb");
        assert_eq!(
            event.formatted(),
            "Mon Jan 15 08:30:00 2024 - USB inserted (/dev/sdb)"
        );

        let mut analyzer = TimelineAnalyzer::new();
        analyzer.add_events(vec![event.clone(), event]);
        assert_eq!(analyzer.as_strings(true).len(), 2);
    }

    #[test]
    fn test_statistics() {
        let mut analyzer = TimelineAnalyzer::new();
        assert!(analyzer.statistics().first_event.is_none());

        analyzer.add_event(TimelineEvent::custom(base_time(), "first", "/a"));
        analyzer.add_event(TimelineEvent::custom(
            base_time() + Duration::hours(2),
            "second",
            "/b",
        ));

        let stats = analyzer.statistics();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.first_event, Some(base_time()));
        assert_eq!(stats.last_event, Some(base_time() + Duration::hours(2)));
        assert_eq!(stats.events_by_type.get(&TimelineEventType::Custom), Some(&2));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("gone"),
            temp_dir.path().join("dangling"),
        )
        .unwrap();

        let mut analyzer = TimelineAnalyzer::new();
        let events = analyzer.build_from_directory(temp_dir.path(), false).unwrap();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.description.ends_with("a.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("sub/b.log"), b"b").unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("sub/up")).unwrap();

        let mut analyzer = TimelineAnalyzer::new();
        let events = analyzer.build_from_directory(temp_dir.path(), false).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = TimelineAnalyzer::new()
            .build_from_directory(temp_dir.path().join("gone"), false)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
