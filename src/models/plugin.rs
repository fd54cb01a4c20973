use serde::{Deserialize, Serialize};

/// Load-order page used by light plugins (`[FE:xxx]`).
pub const LIGHT_PLUGIN_INDEX: u8 = 0xFE;

/// How a plugin occupies the load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginKind {
    /// `.esm` or master-flagged
    Master,
    /// `.esl` or loaded in the `FE` page
    Light,
    Regular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PluginStatus {
    #[default]
    Active,
    Inactive,
    Missing,
    Error,
    Unknown,
}

/// Where a plugin entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PluginSource {
    #[default]
    CrashLog,
    /// A user `loadorder.txt`; the load-order byte is not known
    LoadOrderFile,
}

/// Load-order label for plugins read from `loadorder.txt`.
pub const LOAD_ORDER_FILE_LABEL: &str = "LO";

/// A plugin entry from the crash log's plugin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub file_name: String,
    pub display_name: String,
    /// Load-order byte; `0xFE` for light plugins
    pub load_order: u8,
    /// Index inside the `FE` page for light plugins
    pub light_index: Option<u16>,
    pub kind: PluginKind,
    pub status: PluginStatus,
    pub flags: Option<String>,
    #[serde(default)]
    pub source: PluginSource,
}

impl Plugin {
    pub fn new(file_name: impl Into<String>, load_order: u8, light_index: Option<u16>) -> Self {
        let file_name = file_name.into();
        let lower = file_name.to_lowercase();

        let kind = if light_index.is_some() || lower.ends_with(".esl") {
            PluginKind::Light
        } else if lower.ends_with(".esm") {
            PluginKind::Master
        } else {
            PluginKind::Regular
        };

        let display_name = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| file_name.clone());

        Self {
            file_name,
            display_name,
            load_order,
            light_index,
            kind,
            status: PluginStatus::Active,
            flags: None,
            source: PluginSource::CrashLog,
        }
    }

    /// An entry from `loadorder.txt`, which lists names only.
    pub fn from_load_order_file(file_name: impl Into<String>) -> Self {
        Self {
            source: PluginSource::LoadOrderFile,
            ..Self::new(file_name, 0, None)
        }
    }

    pub fn with_flags(mut self, flags: Option<String>) -> Self {
        self.flags = flags.filter(|f| !f.trim().is_empty());
        self
    }

    pub fn is_light(&self) -> bool {
        self.light_index.is_some()
    }

    /// Whether `load_order` and `light_index` are real, so FormIDs can be
    /// matched against them.
    pub fn has_known_index(&self) -> bool {
        self.source == PluginSource::CrashLog
    }

    /// Load-order prefix as printed in reports, e.g. `05`, `FE:001` or `LO`.
    pub fn load_order_label(&self) -> String {
        if !self.has_known_index() {
            return LOAD_ORDER_FILE_LABEL.to_string();
        }
        match self.light_index {
            Some(index) => format!("FE:{:03X}", index),
            None => format!("{:02X}", self.load_order),
        }
    }
}

/// Plugin-limit detection outcome for one crash log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginLimitStatus {
    /// False when the plugin segment was absent, empty or unparseable
    pub plugins_loaded: bool,
    /// The limit marker was present
    pub reached_limit: bool,
    /// The marker was present but this game/crash generator combination
    /// prints it for unrelated reasons
    pub limit_check_disabled: bool,
}

/// Load-order limits. The `FF` sentinel and the full-plugin ceiling have
/// stayed the same across game versions so far but are kept configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginLimits {
    pub limit_marker: u8,
    pub max_full_plugins: u16,
}

impl Default for PluginLimits {
    fn default() -> Self {
        Self {
            limit_marker: 0xFF,
            max_full_plugins: 254,
        }
    }
}
