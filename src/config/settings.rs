use serde::{Deserialize, Serialize};

/// Scanner settings from `AutoScan Settings.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Run the extended file checks and unlock the Advanced report
    pub fcx_mode: bool,
    pub enhanced_report: bool,
    /// Look up FormID values in the FormID database
    pub show_formid_values: bool,
    pub vr_mode: bool,
    /// Also write `<stem>-AUTOSCAN.json`
    pub write_json: bool,
    /// Extra directory searched for crash logs, empty for none
    pub scan_custom_path: String,
    /// `auto`, `sequential`, `parallel` or `pipeline`
    pub processing_strategy: String,
    /// Entries kept in the analysis cache, 0 disables it
    pub cache_size: usize,
    /// Worker ceiling, 0 for the processor count
    pub max_workers: usize,
    pub debug_mode: bool,
    /// Plugins never reported as suspects, on top of the database's list
    pub ignore_list: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        let mut settings = Self::empty();
        for field in &SETTING_FIELDS {
            (field.set)(&mut settings, field.default.clone());
        }
        settings
    }
}

impl ScanSettings {
    fn empty() -> Self {
        Self {
            fcx_mode: false,
            enhanced_report: false,
            show_formid_values: false,
            vr_mode: false,
            write_json: false,
            scan_custom_path: String::new(),
            processing_strategy: String::new(),
            cache_size: 0,
            max_workers: 0,
            debug_mode: false,
            ignore_list: Vec::new(),
        }
    }
}

/// A setting value as stored in YAML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Count(usize),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn to_yaml(&self) -> serde_yaml_ng::Value {
        match self {
            SettingValue::Bool(b) => serde_yaml_ng::Value::Bool(*b),
            SettingValue::Count(n) => serde_yaml_ng::Value::Number((*n as u64).into()),
            SettingValue::Text(s) => serde_yaml_ng::Value::String(s.clone()),
            SettingValue::List(items) => serde_yaml_ng::Value::Sequence(
                items
                    .iter()
                    .map(|item| serde_yaml_ng::Value::String(item.clone()))
                    .collect(),
            ),
        }
    }
}

/// Maps one [`ScanSettings`] field to its YAML key.
pub struct SettingField {
    pub key: &'static str,
    pub default: SettingValue,
    pub get: fn(&ScanSettings) -> SettingValue,
    pub set: fn(&mut ScanSettings, SettingValue),
}

macro_rules! bool_field {
    ($key:literal, $field:ident, $default:expr) => {
        SettingField {
            key: $key,
            default: SettingValue::Bool($default),
            get: |s| SettingValue::Bool(s.$field),
            set: |s, v| {
                if let SettingValue::Bool(b) = v {
                    s.$field = b;
                }
            },
        }
    };
}

macro_rules! count_field {
    ($key:literal, $field:ident, $default:expr) => {
        SettingField {
            key: $key,
            default: SettingValue::Count($default),
            get: |s| SettingValue::Count(s.$field),
            set: |s, v| {
                if let SettingValue::Count(n) = v {
                    s.$field = n;
                }
            },
        }
    };
}

macro_rules! text_field {
    ($key:literal, $field:ident, $default:literal) => {
        SettingField {
            key: $key,
            default: SettingValue::Text(String::new()),
            get: |s| SettingValue::Text(s.$field.clone()),
            set: |s, v| {
                if let SettingValue::Text(t) = v {
                    s.$field = if t.is_empty() { $default.to_string() } else { t };
                }
            },
        }
    };
}

macro_rules! list_field {
    ($key:literal, $field:ident) => {
        SettingField {
            key: $key,
            default: SettingValue::List(Vec::new()),
            get: |s| SettingValue::List(s.$field.clone()),
            set: |s, v| {
                if let SettingValue::List(items) = v {
                    s.$field = items
                        .into_iter()
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect();
                }
            },
        }
    };
}

/// Field-to-key table; order here is the order keys are saved in.
pub static SETTING_FIELDS: [SettingField; 11] = [
    bool_field!("fcx_mode", fcx_mode, false),
    bool_field!("enhanced_report", enhanced_report, false),
    bool_field!("show_formid_values", show_formid_values, false),
    bool_field!("vr_mode", vr_mode, false),
    bool_field!("write_json", write_json, false),
    text_field!("scan_custom_path", scan_custom_path, ""),
    text_field!("processing_strategy", processing_strategy, "auto"),
    count_field!("cache_size", cache_size, 64),
    count_field!("max_workers", max_workers, 0),
    bool_field!("debug_mode", debug_mode, false),
    list_field!("ignore_list", ignore_list),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_table() {
        let settings = ScanSettings::default();
        assert!(!settings.fcx_mode);
        assert_eq!(settings.processing_strategy, "auto");
        assert_eq!(settings.cache_size, 64);
        assert!(settings.scan_custom_path.is_empty());
    }

    #[test]
    fn test_field_accessors_round_trip() {
        let mut settings = ScanSettings::default();
        let field = SETTING_FIELDS
            .iter()
            .find(|f| f.key == "cache_size")
            .unwrap();
        (field.set)(&mut settings, SettingValue::Count(8));
        assert_eq!((field.get)(&settings), SettingValue::Count(8));
    }

    #[test]
    fn test_ignore_list_drops_blank_entries() {
        let mut settings = ScanSettings::default();
        assert!(settings.ignore_list.is_empty());

        let field = SETTING_FIELDS
            .iter()
            .find(|f| f.key == "ignore_list")
            .unwrap();
        (field.set)(
            &mut settings,
            SettingValue::List(vec![" SomeMod.esp ".to_string(), "".to_string()]),
        );
        assert_eq!(settings.ignore_list, vec!["SomeMod.esp"]);
    }

    #[test]
    fn test_keys_unique() {
        let mut keys: Vec<_> = SETTING_FIELDS.iter().map(|f| f.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), SETTING_FIELDS.len());
    }
}
