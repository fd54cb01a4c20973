use crate::models::SegmentKind;
use crate::models::plugin::LIGHT_PLUGIN_INDEX;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_FORM_TYPE: &str = "Unknown";

/// A FormID token found in a crash log.
///
/// The plugin index and local id are the two halves of `value`; the plugin
/// name and form type are filled in by resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormId {
    /// Eight uppercase hex digits as they appeared in the log
    pub raw: String,
    pub value: u32,
    pub plugin_index: u8,
    pub local_form_id: u32,
    pub plugin_name: String,
    pub form_type: String,
    pub source: SegmentKind,
}

impl FormId {
    pub fn from_value(value: u32, source: SegmentKind) -> Self {
        Self {
            raw: format!("{:08X}", value),
            value,
            plugin_index: (value >> 24) as u8,
            local_form_id: value & 0x00FF_FFFF,
            plugin_name: String::new(),
            form_type: UNKNOWN_FORM_TYPE.to_string(),
            source,
        }
    }

    /// Parse an eight-digit hex token (with or without `0x`).
    pub fn parse(token: &str, source: SegmentKind) -> Option<Self> {
        let hex = token
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        if hex.len() != 8 {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        Some(Self::from_value(value, source))
    }

    /// `plugin_index` and `local_form_id` formatted back into a token.
    pub fn recompose(&self) -> String {
        format!("{:02X}{:06X}", self.plugin_index, self.local_form_id)
    }

    pub fn is_consistent(&self) -> bool {
        self.recompose() == self.raw.to_uppercase()
    }

    /// Index inside the `FE` page when this form belongs to a light plugin.
    pub fn light_index(&self) -> Option<u16> {
        (self.plugin_index == LIGHT_PLUGIN_INDEX).then(|| ((self.local_form_id >> 12) & 0xFFF) as u16)
    }

    pub fn is_resolved(&self) -> bool {
        !self.plugin_name.is_empty()
    }
}

/// A distinct FormID and how often it appeared in one log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormIdHit {
    pub form_id: FormId,
    pub count: usize,
    /// Value from an external FormID database, if one was consulted
    pub description: Option<String>,
}
