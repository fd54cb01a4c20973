pub mod crashgen;
pub mod settings;

pub use crashgen::{
    ConfigEntry, ConfigValue, ConfigValueError, ConfigValueReader, ConfigValueWriter,
    LogSettingsReader, TomlConfigFile,
};
pub use settings::{SETTING_FIELDS, ScanSettings, SettingValue};

use crate::models::ScanDatabase;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Environment variable prefix for setting overrides, e.g. `AUTOSCAN_FCX_MODE=true`.
pub const ENV_PREFIX: &str = "AUTOSCAN";

/// Configuration manager for the scanner's YAML files.
///
/// Manages two files in the data directory:
/// - Settings (`AutoScan Settings.yaml`): user-facing scanner switches
/// - Database (`AutoScan Database.yaml`): suspect patterns, mod tables, game info
///
/// A `loadorder.txt` next to them, when present, is read by the caller.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    database_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`, creating it if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("AutoScan Settings.yaml"),
            database_path: config_dir.join("AutoScan Database.yaml"),
            config_dir,
        })
    }

    /// Load scanner settings.
    ///
    /// The YAML file is optional; `AUTOSCAN_*` environment variables override
    /// it. Keys absent from both keep the defaults from [`SETTING_FIELDS`].
    pub fn load_settings(&self) -> Result<ScanSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let source = config::Config::builder()
            .add_source(
                config::File::from(self.settings_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ignore_list"),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let mut settings = ScanSettings::default();
        for field in &SETTING_FIELDS {
            let value = match &field.default {
                SettingValue::Bool(_) => source.get_bool(field.key).map(SettingValue::Bool),
                SettingValue::Count(_) => source
                    .get_int(field.key)
                    .map(|n| SettingValue::Count(n.max(0) as usize)),
                SettingValue::Text(_) => source.get_string(field.key).map(SettingValue::Text),
                SettingValue::List(_) => source.get_array(field.key).and_then(|items| {
                    items
                        .into_iter()
                        .map(|item| item.into_string())
                        .collect::<Result<Vec<_>, _>>()
                        .map(SettingValue::List)
                }),
            };
            match value {
                Ok(value) => (field.set)(&mut settings, value),
                Err(config::ConfigError::NotFound(_)) => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Invalid value for setting '{}'", field.key));
                }
            }
        }

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save scanner settings in table order.
    pub fn save_settings(&self, settings: &ScanSettings) -> Result<()> {
        let mut mapping = serde_yaml_ng::Mapping::new();
        for field in &SETTING_FIELDS {
            mapping.insert(
                serde_yaml_ng::Value::String(field.key.to_string()),
                (field.get)(settings).to_yaml(),
            );
        }

        let yaml_string =
            serde_yaml_ng::to_string(&mapping).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load the scan database.
    ///
    /// A missing or malformed file is not fatal: the packaged database is
    /// used instead and a warning is logged.
    pub fn load_database(&self) -> ScanDatabase {
        if !self.database_path.exists() {
            tracing::warn!(
                "Database file not found at {}, using packaged database",
                self.database_path
            );
            return ScanDatabase::packaged();
        }

        match self.read_database() {
            Ok(database) => {
                tracing::info!("Loaded database from {}", self.database_path);
                database
            }
            Err(e) => {
                tracing::warn!("{:#}, using packaged database", e);
                ScanDatabase::packaged()
            }
        }
    }

    fn read_database(&self) -> Result<ScanDatabase> {
        let file_contents = fs::read_to_string(&self.database_path)
            .with_context(|| format!("Failed to read database: {}", self.database_path))?;

        serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse database: {}", self.database_path))
    }

    /// Write the packaged database out so users can extend it.
    pub fn export_packaged_database(&self) -> Result<()> {
        fs::write(&self.database_path, crate::models::database::PACKAGED_DATABASE)
            .with_context(|| format!("Failed to write database: {}", self.database_path))?;

        tracing::info!("Exported packaged database to {}", self.database_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Utf8Path {
        &self.database_path
    }

    /// Optional `loadorder.txt` that replaces every log's plugin list.
    pub fn load_order_path(&self) -> Utf8PathBuf {
        self.config_dir.join("loadorder.txt")
    }
}
