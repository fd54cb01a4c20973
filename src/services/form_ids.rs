use crate::models::plugin::LIGHT_PLUGIN_INDEX;
use crate::models::{CrashLog, FormId, FormIdHit, Plugin, SegmentKind, UNKNOWN_FORM_TYPE};
use regex::Regex;
use std::collections::BTreeMap;

/// Source of human-readable FormID descriptions, e.g. a FormID database.
#[cfg_attr(test, mockall::automock)]
pub trait FormIdLookup: Send + Sync {
    fn describe(&self, form_id: &FormId) -> Option<String>;
}

pub struct FormIdExtractor {
    token: Regex,
    form_type: Regex,
}

impl Default for FormIdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormIdExtractor {
    pub fn new() -> Self {
        Self {
            token: Regex::new(r"(?i)Form ?ID:\s*0x([0-9A-F]{8})").expect("Invalid FormID regex"),
            form_type: Regex::new(r"\((\w+)\*\)").expect("Invalid form type regex"),
        }
    }

    /// Every FormID token in the stack segments, duplicates included.
    ///
    /// Runtime forms (`FF` index) are not backed by any plugin and are dropped.
    /// The form type comes from the closest preceding `(Type*)` annotation.
    pub fn extract(&self, log: &CrashLog) -> Vec<FormId> {
        let mut form_ids = Vec::new();

        for kind in SegmentKind::STACK_TEXT {
            let mut last_type: Option<String> = None;
            for line in log.segment(kind) {
                if let Some(caps) = self.form_type.captures(line) {
                    last_type = Some(caps[1].to_string());
                }
                for caps in self.token.captures_iter(line) {
                    let Some(mut form_id) = FormId::parse(&caps[1], kind) else {
                        continue;
                    };
                    if form_id.plugin_index == 0xFF {
                        continue;
                    }
                    if let Some(form_type) = &last_type {
                        form_id.form_type = form_type.clone();
                    }
                    form_ids.push(form_id);
                }
            }
        }

        form_ids
    }
}

/// Fill in the plugin name for each FormID.
///
/// Resolution never fails hard: an index with no matching plugin, or a token
/// that does not decompose back to itself, leaves the plugin name empty and
/// the form type `Unknown`.
pub fn resolve_form_ids(form_ids: &mut [FormId], plugins: &[Plugin]) {
    for form_id in form_ids.iter_mut() {
        if !form_id.is_consistent() {
            tracing::warn!("FormID {} does not decompose cleanly", form_id.raw);
            form_id.form_type = UNKNOWN_FORM_TYPE.to_string();
            continue;
        }

        let owner = match form_id.light_index() {
            Some(light) => plugins
                .iter()
                .find(|p| p.load_order == LIGHT_PLUGIN_INDEX && p.light_index == Some(light)),
            None => plugins
                .iter()
                .find(|p| p.has_known_index() && !p.is_light() && p.load_order == form_id.plugin_index),
        };

        match owner {
            Some(plugin) => form_id.plugin_name = plugin.file_name.clone(),
            None => {
                tracing::debug!("No plugin for FormID {}", form_id.raw);
                form_id.form_type = UNKNOWN_FORM_TYPE.to_string();
            }
        }
    }
}

/// Count FormIDs, sorted by plugin name then token.
pub fn count_form_ids(form_ids: Vec<FormId>, lookup: Option<&dyn FormIdLookup>) -> Vec<FormIdHit> {
    let mut grouped: BTreeMap<(String, String), (FormId, usize)> = BTreeMap::new();
    for form_id in form_ids {
        grouped
            .entry((form_id.plugin_name.clone(), form_id.raw.clone()))
            .and_modify(|(_, count)| *count += 1)
            .or_insert((form_id, 1));
    }

    grouped
        .into_values()
        .map(|(form_id, count)| {
            let description = lookup.and_then(|l| l.describe(&form_id));
            FormIdHit {
                form_id,
                count,
                description,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Segments;
    use camino::Utf8PathBuf;
    use proptest::prelude::*;

    fn log_with_stack(lines: &[&str]) -> CrashLog {
        let mut segments = Segments::new();
        segments.insert(
            SegmentKind::Stack,
            lines.iter().map(|l| l.to_string()).collect(),
        );
        CrashLog {
            file_name: "crash-test.log".to_string(),
            path: Utf8PathBuf::from("crash-test.log"),
            created: None,
            game_version: String::new(),
            crashgen_version: String::new(),
            main_error: String::new(),
            lines: Vec::new(),
            segments,
            plugins: Vec::new(),
            suspects: Vec::new(),
        }
    }

    #[test]
    fn test_extract_and_resolve() {
        let log = log_with_stack(&[
            "\t[RSP+50] 0x1 (TESObjectREFR*)",
            "\t\tForm ID: 0x0501ABCD",
            "\t\tFormID: 0xFE001800",
            "\t\tForm ID: 0xFF000001",
            "\t\tForm ID: 0x0501ABCD",
        ]);
        let mut form_ids = FormIdExtractor::new().extract(&log);
        // The runtime FF form is dropped
        assert_eq!(form_ids.len(), 3);
        assert_eq!(form_ids[0].form_type, "TESObjectREFR");

        let plugins = vec![
            Plugin::new("SomeMod.esp", 5, None),
            Plugin::new("Tiny.esl", 0xFE, Some(1)),
        ];
        resolve_form_ids(&mut form_ids, &plugins);
        assert_eq!(form_ids[0].plugin_name, "SomeMod.esp");
        assert_eq!(form_ids[1].plugin_name, "Tiny.esl");

        let hits = count_form_ids(form_ids, None);
        assert_eq!(hits.len(), 2);
        let some_mod = hits.iter().find(|h| h.form_id.raw == "0501ABCD").unwrap();
        assert_eq!(some_mod.count, 2);
    }

    #[test]
    fn test_unresolved_is_soft() {
        let log = log_with_stack(&["Form ID: 0x2A000001"]);
        let mut form_ids = FormIdExtractor::new().extract(&log);
        resolve_form_ids(&mut form_ids, &[]);
        assert!(!form_ids[0].is_resolved());
        assert_eq!(form_ids[0].form_type, UNKNOWN_FORM_TYPE);
    }

    #[test]
    fn test_unresolved_drops_annotated_type() {
        let log = log_with_stack(&["	[RSP+50] 0x1 (TESNPC*)", "		Form ID: 0x2A000001"]);
        let mut form_ids = FormIdExtractor::new().extract(&log);
        assert_eq!(form_ids[0].form_type, "TESNPC");

        resolve_form_ids(&mut form_ids, &[Plugin::new("SomeMod.esp", 5, None)]);
        assert!(!form_ids[0].is_resolved());
        assert_eq!(form_ids[0].form_type, UNKNOWN_FORM_TYPE);
    }

    #[test]
    fn test_lookup_description() {
        let mut lookup = MockFormIdLookup::new();
        lookup
            .expect_describe()
            .returning(|f| Some(format!("record {}", f.raw)));

        let form_ids = vec![FormId::from_value(0x05000001, SegmentKind::CallStack)];
        let hits = count_form_ids(form_ids, Some(&lookup));
        assert_eq!(hits[0].description.as_deref(), Some("record 05000001"));
    }

    proptest! {
        #[test]
        fn prop_decomposition_reproduces_token(value in any::<u32>()) {
            let token = format!("0x{:08X}", value);
            let form_id = FormId::parse(&token, SegmentKind::CallStack).unwrap();
            prop_assert_eq!(form_id.recompose(), format!("{:08X}", value));
            prop_assert_eq!(form_id.plugin_index as u32, value >> 24);
            prop_assert_eq!(form_id.local_form_id, value & 0x00FF_FFFF);
        }
    }
}
