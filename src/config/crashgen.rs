//! Crash generator settings access.
//!
//! The validator reads settings through [`ConfigValueReader`] so it does not
//! care whether they came from the settings echoed in a crash log or from the
//! crash generator's TOML file on disk. Only the TOML file can be written back.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;

/// Section assumed for settings that appear before any `[Section]` header.
pub const DEFAULT_SECTION: &str = "Compatibility";

/// A single crash generator setting value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl ConfigValue {
    /// Interpret raw text the way the crash generator writes it.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().trim_matches('"');
        if raw.eq_ignore_ascii_case("true") {
            ConfigValue::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            ConfigValue::Bool(false)
        } else if let Ok(number) = raw.parse::<i64>() {
            ConfigValue::Integer(number)
        } else {
            ConfigValue::Text(raw.to_string())
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(value) => Some(*value),
            ConfigValue::Integer(value) => Some(*value != 0),
            ConfigValue::Text(_) => None,
        }
    }

    /// Booleans compare by truthiness so `1` satisfies `true`.
    pub fn matches(&self, expected: &ConfigValue) -> bool {
        match expected {
            ConfigValue::Bool(expected) => self.as_bool() == Some(*expected),
            other => self == other,
        }
    }

    fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::Boolean(b) => Some(ConfigValue::Bool(*b)),
            toml::Value::Integer(i) => Some(ConfigValue::Integer(*i)),
            toml::Value::String(s) => Some(ConfigValue::Text(s.clone())),
            toml::Value::Float(f) => Some(ConfigValue::Text(f.to_string())),
            _ => None,
        }
    }

    fn to_toml(&self) -> toml::Value {
        match self {
            ConfigValue::Bool(b) => toml::Value::Boolean(*b),
            ConfigValue::Integer(i) => toml::Value::Integer(*i),
            ConfigValue::Text(s) => toml::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(true) => f.write_str("TRUE"),
            ConfigValue::Bool(false) => f.write_str("FALSE"),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Text(s) => f.write_str(s),
        }
    }
}

/// One `(section, key, value)` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub section: String,
    pub key: String,
    pub value: ConfigValue,
}

#[derive(Error, Debug)]
pub enum ConfigValueError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: Utf8PathBuf, reason: String },

    #[error("Section [{0}] is not a table")]
    NotATable(String),
}

/// Read access to crash generator settings by section and key.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigValueReader: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Option<ConfigValue>;

    /// All settings in source order.
    fn entries(&self) -> Vec<ConfigEntry>;
}

/// Write access, used by the live-fix pass.
pub trait ConfigValueWriter: ConfigValueReader {
    fn set(&mut self, section: &str, key: &str, value: ConfigValue) -> Result<(), ConfigValueError>;

    fn save(&self) -> Result<(), ConfigValueError>;
}

/// Settings as echoed into the crash log by the crash generator.
///
/// Lines look like `\t\tMemoryManager: true` grouped under `\t[Patches]`.
#[derive(Debug, Clone, Default)]
pub struct LogSettingsReader {
    entries: Vec<ConfigEntry>,
}

impl LogSettingsReader {
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut section = DEFAULT_SECTION.to_string();
        let mut entries = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.push(ConfigEntry {
                section: section.clone(),
                key: key.to_string(),
                value: ConfigValue::parse(value),
            });
        }

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigValueReader for LogSettingsReader {
    fn get(&self, section: &str, key: &str) -> Option<ConfigValue> {
        // Section names have moved between crash generator releases, so a key
        // found under another section still counts.
        self.entries
            .iter()
            .find(|e| e.key == key && e.section.eq_ignore_ascii_case(section))
            .or_else(|| self.entries.iter().find(|e| e.key == key))
            .map(|e| e.value.clone())
    }

    fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.clone()
    }
}

/// The crash generator's TOML settings file on disk.
#[derive(Debug, Clone)]
pub struct TomlConfigFile {
    path: Utf8PathBuf,
    table: toml::Table,
}

impl TomlConfigFile {
    pub fn load<P: AsRef<Utf8Path>>(path: P) -> Result<Self, ConfigValueError> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigValueError::Io {
            path: path.clone(),
            source,
        })?;
        let table = contents
            .parse::<toml::Table>()
            .map_err(|e| ConfigValueError::Parse {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!("Loaded crash generator settings from {}", path);
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl ConfigValueReader for TomlConfigFile {
    fn get(&self, section: &str, key: &str) -> Option<ConfigValue> {
        self.table
            .get(section)
            .and_then(toml::Value::as_table)
            .and_then(|table| table.get(key))
            .and_then(ConfigValue::from_toml)
    }

    fn entries(&self) -> Vec<ConfigEntry> {
        let mut entries = Vec::new();
        for (section, value) in &self.table {
            let Some(table) = value.as_table() else {
                continue;
            };
            for (key, value) in table {
                if let Some(value) = ConfigValue::from_toml(value) {
                    entries.push(ConfigEntry {
                        section: section.clone(),
                        key: key.clone(),
                        value,
                    });
                }
            }
        }
        entries
    }
}

impl ConfigValueWriter for TomlConfigFile {
    fn set(&mut self, section: &str, key: &str, value: ConfigValue) -> Result<(), ConfigValueError> {
        let section_value = self
            .table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let table = section_value
            .as_table_mut()
            .ok_or_else(|| ConfigValueError::NotATable(section.to_string()))?;
        table.insert(key.to_string(), value.to_toml());
        Ok(())
    }

    fn save(&self) -> Result<(), ConfigValueError> {
        let contents = toml::to_string_pretty(&self.table).map_err(|e| ConfigValueError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, contents).map_err(|source| ConfigValueError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!("Saved crash generator settings to {}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_values() {
        assert_eq!(ConfigValue::parse(" true"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse("FALSE"), ConfigValue::Bool(false));
        assert_eq!(ConfigValue::parse("4096"), ConfigValue::Integer(4096));
        assert_eq!(ConfigValue::parse("\"abc\""), ConfigValue::Text("abc".to_string()));
    }

    #[test]
    fn test_truthy_matching() {
        assert!(ConfigValue::Integer(1).matches(&ConfigValue::Bool(true)));
        assert!(ConfigValue::Integer(0).matches(&ConfigValue::Bool(false)));
        assert!(!ConfigValue::Text("yes".into()).matches(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_log_settings_reader_sections() {
        let lines = [
            "\t\tF4EE: true",
            "\t[Patches]",
            "\t\tAchievements: true",
            "\t\tMemoryManager: false",
            "",
        ];
        let reader = LogSettingsReader::from_lines(&lines);

        assert_eq!(reader.get("Compatibility", "F4EE"), Some(ConfigValue::Bool(true)));
        assert_eq!(reader.get("Patches", "MemoryManager"), Some(ConfigValue::Bool(false)));
        // Falls back to any section
        assert_eq!(reader.get("Fixes", "Achievements"), Some(ConfigValue::Bool(true)));
        assert_eq!(reader.get("Patches", "Missing"), None);
        assert_eq!(reader.entries().len(), 3);
    }

    #[test]
    fn test_toml_file_read_write() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[Patches]\nArchiveLimit = true\nMaxStdIO = 2048").unwrap();
        temp_file.flush().unwrap();

        let path = Utf8PathBuf::try_from(temp_file.path().to_path_buf()).unwrap();
        let mut file = TomlConfigFile::load(&path).unwrap();
        assert_eq!(file.get("Patches", "ArchiveLimit"), Some(ConfigValue::Bool(true)));
        assert_eq!(file.get("Patches", "MaxStdIO"), Some(ConfigValue::Integer(2048)));

        file.set("Patches", "ArchiveLimit", ConfigValue::Bool(false)).unwrap();
        file.save().unwrap();

        let reloaded = TomlConfigFile::load(&path).unwrap();
        assert_eq!(reloaded.get("Patches", "ArchiveLimit"), Some(ConfigValue::Bool(false)));
    }

    #[test]
    fn test_toml_missing_file() {
        let result = TomlConfigFile::load("definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigValueError::Io { .. })));
    }
}
