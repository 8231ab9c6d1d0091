//! Windows registry export (`.reg`) parsing
//!
//! Text exports only. Section headers (`[HKEY_...\Key]`) set the current key;
//! `name=value` lines below a header become [`RegistryValue`]s.

mod line;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, ToolkitError};
use line::RegLine;

/// A single value from a registry export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryValue {
    pub key_path: String,
    pub name: String,
    pub value: String,
}

/// Stateful parser holding the values of the last parsed export
#[derive(Debug, Clone, Default)]
pub struct WindowsRegistryParser {
    values: Vec<RegistryValue>,
}

impl WindowsRegistryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an export file, replacing previously parsed values
    pub fn parse_reg_file(&mut self, path: impl AsRef<Path>) -> Result<&[RegistryValue]> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolkitError::missing_path("Registry file", path));
        }

        let bytes = std::fs::read(path)?;
        let text = decode_export(&bytes);
        self.values = parse_export(&text);

        tracing::info!(
            "Parsed {} registry value(s) from {}",
            self.values.len(),
            path.display()
        );
        Ok(&self.values)
    }

    /// Parse export text that is already in memory
    pub fn parse_str(&mut self, text: &str) -> &[RegistryValue] {
        self.values = parse_export(text);
        &self.values
    }

    pub fn values(&self) -> &[RegistryValue] {
        &self.values
    }

    /// Values grouped by key path
    pub fn to_map(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut map: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for value in &self.values {
            map.entry(value.key_path.clone())
                .or_default()
                .insert(value.name.clone(), value.value.clone());
        }
        map
    }

    /// Values whose key path contains `key_substring`, ignoring case
    pub fn find_values(&self, key_substring: &str) -> Vec<&RegistryValue> {
        let needle = key_substring.to_lowercase();
        self.values
            .iter()
            .filter(|v| v.key_path.to_lowercase().contains(&needle))
            .collect()
    }
}

/// Decode an export, honouring a UTF-16/UTF-8 BOM
///
/// regedit writes UTF-16LE with a BOM; older `REGEDIT4` files are plain
/// 8-bit text. Undecodable bytes become U+FFFD.
fn decode_export(bytes: &[u8]) -> String {
    let encoding = encoding_rs::Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("Registry export contained undecodable bytes");
    }
    text.into_owned()
}

fn parse_export(text: &str) -> Vec<RegistryValue> {
    let mut current_key: Option<String> = None;
    let mut values = Vec::new();

    for raw in text.lines() {
        match line::classify(raw.trim()) {
            RegLine::Section(key) => current_key = Some(key.to_string()),
            RegLine::Entry { name, value } => match current_key.as_deref() {
                Some(key) if !key.is_empty() => values.push(RegistryValue {
                    key_path: key.to_string(),
                    name: name.to_string(),
                    value: value.to_string(),
                }),
                _ => tracing::debug!("Skipping value outside any key: {}", raw),
            },
            RegLine::Blank | RegLine::Comment | RegLine::Other => {}
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"Windows Registry Editor Version 5.00

; exported from a lab machine
[HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Run]
"OneDrive"="\"C:\\Users\\alice\\OneDrive.exe\" /background"
"Updater" = dword:00000001

[HKEY_LOCAL_MACHINE\SYSTEM\CurrentControlSet\Services\Tcpip\Parameters]
"Hostname"="WORKSTATION01"
@="default"
"#;

    #[test]
    fn test_parse_sample() {
        let mut parser = WindowsRegistryParser::new();
        let values = parser.parse_str(SAMPLE);

        assert_eq!(values.len(), 4);
        assert_eq!(
            values[0].key_path,
            r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Run"
        );
        assert_eq!(values[0].name, "OneDrive");
        assert_eq!(
            values[0].value,
            r#""\"C:\\Users\\alice\\OneDrive.exe\" /background""#
        );
        assert_eq!(values[1].name, "Updater");
        assert_eq!(values[1].value, "dword:00000001");
        assert_eq!(values[3].name, "@");
    }

    #[test]
    fn test_values_before_section_are_ignored() {
        let mut parser = WindowsRegistryParser::new();
        let values = parser.parse_str("\"Orphan\"=\"x\"\n[HKEY_USERS\\S-1]\n\"A\"=\"1\"\n");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].key_path, r"HKEY_USERS\S-1");
    }

    #[test]
    fn test_find_values_is_case_insensitive() {
        let mut parser = WindowsRegistryParser::new();
        parser.parse_str(SAMPLE);

        let run = parser.find_values("currentversion\\RUN");
        assert_eq!(run.len(), 2);
        assert!(parser.find_values("NoSuchKey").is_empty());
    }

    #[test]
    fn test_to_map_groups_by_key() {
        let mut parser = WindowsRegistryParser::new();
        parser.parse_str(SAMPLE);

        let map = parser.to_map();
        assert_eq!(map.len(), 2);
        let tcpip = &map[r"HKEY_LOCAL_MACHINE\SYSTEM\CurrentControlSet\Services\Tcpip\Parameters"];
        assert_eq!(tcpip["Hostname"], "\"WORKSTATION01\"");
    }

    #[test]
    fn test_parse_utf16_export() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.reg");

        let mut bytes = vec![0xFF, 0xFE];
        for unit in SAMPLE.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        std::fs::write(&path, bytes).unwrap();

        let mut parser = WindowsRegistryParser::new();
        let values = parser.parse_reg_file(&path).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[2].value, "\"WORKSTATION01\"");
    }

    #[test]
    fn test_parse_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = WindowsRegistryParser::new()
            .parse_reg_file(temp_dir.path().join("absent.reg"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_reparse_replaces_values() {
        let mut parser = WindowsRegistryParser::new();
        parser.parse_str(SAMPLE);
        parser.parse_str("[HKEY_USERS\\X]\n\"Only\"=\"1\"\n");
        assert_eq!(parser.values().len(), 1);
    }
}
