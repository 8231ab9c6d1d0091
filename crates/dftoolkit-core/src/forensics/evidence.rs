/// Evidence registration and chain-of-custody logging
///
/// The ledger is append-only: items are never removed or edited, and every
/// custody log starts with the entry synthesized at registration time.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, ToolkitError};
use crate::forensics::clock::{Clock, SystemClock};
use crate::forensics::hashing::HashDigestSet;

/// Actor recorded on the registration entry
pub const SYSTEM_ACTOR: &str = "System";
pub const REGISTRATION_ACTION: &str = "Item registered";
pub const REGISTRATION_NOTES: &str = "Initial registration";

/// The artifact being tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub identifier: String,
    pub description: String,
    /// Path or URI where the artifact is stored
    pub location: String,
    /// Digests captured at registration
    pub hashes: Option<HashDigestSet>,
}

/// Single custody log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub notes: Option<String>,
}

impl CustodyEntry {
    /// `  - {timestamp} :: {actor} :: {action}[ :: {notes}]`
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "  - {} :: {} :: {}",
            format_timestamp(&self.timestamp),
            self.actor,
            self.action
        );
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            line.push_str(" :: ");
            line.push_str(notes);
        }
        line
    }
}

/// An item together with its custody log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub item: EvidenceItem,
    pub custody_log: Vec<CustodyEntry>,
}

impl EvidenceRecord {
    pub fn identifier(&self) -> &str {
        &self.item.identifier
    }

    pub fn header_line(&self) -> String {
        format!(
            "Evidence {}: {} (stored at {})",
            self.item.identifier, self.item.description, self.item.location
        )
    }

    fn append(
        &mut self,
        now: DateTime<Utc>,
        actor: String,
        action: String,
        notes: Option<String>,
    ) -> &CustodyEntry {
        // Keep the log non-decreasing even if the clock steps backwards
        let timestamp = match self.custody_log.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.custody_log.push(CustodyEntry {
            timestamp,
            actor,
            action,
            notes,
        });
        &self.custody_log[self.custody_log.len() - 1]
    }
}

/// Insertion-ordered registry of evidence records
pub struct EvidenceLedger {
    records: Vec<EvidenceRecord>,
    index: HashMap<String, usize>,
    clock: Box<dyn Clock>,
}

impl Default for EvidenceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvidenceLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceLedger")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl EvidenceLedger {
    /// Create an empty ledger stamped by the wall clock
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Create an empty ledger with a custom time source
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            clock,
        }
    }

    /// Register a new evidence item
    ///
    /// Fails with `DuplicateIdentifier` if the identifier is already known;
    /// the existing record is left untouched.
    pub fn register_item(
        &mut self,
        identifier: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
        hashes: Option<HashDigestSet>,
    ) -> Result<&EvidenceRecord> {
        let identifier = identifier.into();
        if self.index.contains_key(&identifier) {
            return Err(ToolkitError::DuplicateIdentifier(identifier));
        }

        let mut record = EvidenceRecord {
            item: EvidenceItem {
                identifier: identifier.clone(),
                description: description.into(),
                location: location.into(),
                hashes,
            },
            custody_log: Vec::new(),
        };
        record.append(
            self.clock.now(),
            SYSTEM_ACTOR.to_string(),
            REGISTRATION_ACTION.to_string(),
            Some(REGISTRATION_NOTES.to_string()),
        );

        tracing::info!("Registered evidence item {}", identifier);
        let position = self.records.len();
        self.index.insert(identifier, position);
        self.records.push(record);
        Ok(&self.records[position])
    }

    /// Append a custody entry to an existing item
    pub fn log_transfer(
        &mut self,
        identifier: &str,
        actor: impl Into<String>,
        action: impl Into<String>,
        notes: Option<String>,
    ) -> Result<&CustodyEntry> {
        let position = *self
            .index
            .get(identifier)
            .ok_or_else(|| ToolkitError::NotFound {
                kind: "Evidence item",
                target: identifier.to_string(),
            })?;

        let now = self.clock.now();
        let entry = self.records[position].append(now, actor.into(), action.into(), notes);
        tracing::info!(
            "Custody entry for {}: {} by {}",
            identifier,
            entry.action,
            entry.actor
        );
        Ok(entry)
    }

    pub fn get(&self, identifier: &str) -> Option<&EvidenceRecord> {
        self.index.get(identifier).map(|&i| &self.records[i])
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    /// Records in registration order
    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Human-readable lines, recomputed on every call
    pub fn summary(&self) -> impl Iterator<Item = String> + '_ {
        self.records.iter().flat_map(|record| {
            std::iter::once(record.header_line())
                .chain(record.custody_log.iter().map(CustodyEntry::summary_line))
        })
    }

    /// Write the full ledger as JSON, replacing any existing file
    pub fn export(&self, destination: impl AsRef<Path>) -> Result<PathBuf> {
        let destination = destination.as_ref();
        let json = serde_json::to_string_pretty(&LedgerView(&self.records))?;
        std::fs::write(destination, json)?;

        tracing::info!(
            "Exported {} evidence record(s) to {}",
            self.records.len(),
            destination.display()
        );
        Ok(destination.to_path_buf())
    }

    /// Load a ledger previously written by [`export`](Self::export)
    pub fn import(source: impl AsRef<Path>) -> Result<Self> {
        Self::import_with_clock(source, Box::new(SystemClock))
    }

    pub fn import_with_clock(source: impl AsRef<Path>, clock: Box<dyn Clock>) -> Result<Self> {
        let source = source.as_ref();
        if !source.is_file() {
            return Err(ToolkitError::missing_path("Ledger file", source));
        }

        let json = std::fs::read_to_string(source)?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&json)?;

        let mut ledger = Self::with_clock(clock);
        for (key, record) in snapshot.0 {
            check_imported(&key, &record)?;
            let identifier = record.item.identifier.clone();
            if ledger.index.contains_key(&identifier) {
                return Err(ToolkitError::DuplicateIdentifier(identifier));
            }
            ledger.index.insert(identifier, ledger.records.len());
            ledger.records.push(record);
        }

        tracing::debug!(
            "Imported {} evidence record(s) from {}",
            ledger.len(),
            source.display()
        );
        Ok(ledger)
    }
}

/// Reject records that `register_item` and `log_transfer` could never produce
fn check_imported(key: &str, record: &EvidenceRecord) -> Result<()> {
    let corrupt = |reason: String| ToolkitError::CorruptLedger {
        identifier: key.to_string(),
        reason,
    };

    if key != record.item.identifier {
        return Err(corrupt(format!(
            "key does not match item identifier {}",
            record.item.identifier
        )));
    }

    let first = record
        .custody_log
        .first()
        .ok_or_else(|| corrupt("empty custody log".to_string()))?;
    if first.actor != SYSTEM_ACTOR || first.action != REGISTRATION_ACTION {
        return Err(corrupt(format!(
            "first entry is {} / {}, not the registration entry",
            first.actor, first.action
        )));
    }

    if let Some(position) = record
        .custody_log
        .windows(2)
        .position(|w| w[1].timestamp < w[0].timestamp)
    {
        return Err(corrupt(format!(
            "custody entry {} predates the one before it",
            position + 1
        )));
    }
    Ok(())
}

/// ISO-8601 rendering used in summaries
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Serializes records as one JSON object keyed by identifier, in order
struct LedgerView<'a>(&'a [EvidenceRecord]);

impl Serialize for LedgerView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0 {
            map.serialize_entry(&record.item.identifier, record)?;
        }
        map.end()
    }
}

/// Keyed records in file order
struct LedgerSnapshot(Vec<(String, EvidenceRecord)>);

impl<'de> Deserialize<'de> for LedgerSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = LedgerSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of evidence identifiers to records")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut records = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, EvidenceRecord>()? {
                    records.push(entry);
                }
                Ok(LedgerSnapshot(records))
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}
