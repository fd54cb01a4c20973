use crate::error::{ScanError, ScanResult};
use crate::models::plugin::LIGHT_PLUGIN_INDEX;
use crate::models::{GameContext, Plugin, PluginLimitStatus};
use camino::Utf8Path;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Plugins parsed from the `PLUGINS:` segment.
#[derive(Debug, Clone, Default)]
pub struct PluginList {
    pub plugins: Vec<Plugin>,
    pub limit: PluginLimitStatus,
}

impl PluginList {
    pub fn find(&self, file_name: &str) -> Option<&Plugin> {
        self.plugins
            .iter()
            .find(|p| p.file_name.eq_ignore_ascii_case(file_name))
    }
}

pub struct PluginExtractor {
    entry_pattern: Regex,
    module_version: Regex,
}

impl Default for PluginExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginExtractor {
    pub fn new() -> Self {
        Self {
            entry_pattern: Regex::new(
                r"(?i)^\s*\[(FE:([0-9A-F]{3})|[0-9A-F]{2})\]\s*(.+?\.es[pml])(?:\s*\[([^\]]*)\])?\s*$",
            )
            .expect("Invalid plugin entry regex"),
            module_version: Regex::new(r"(?i)\s+v?\d+(\.\d+)*\s*$").expect("Invalid module version regex"),
        }
    }

    /// Parse plugin entries in source order.
    ///
    /// An `FF` entry is the plugin-limit marker: it sets `reached_limit` (or
    /// `limit_check_disabled` when the marker is known to be unreliable for
    /// this game and crash generator) and produces no plugin. A segment with
    /// lines but no parseable entry is a partial extraction failure.
    pub fn extract<S: AsRef<str>>(
        &self,
        lines: Option<&[S]>,
        context: &GameContext,
        game_version: &str,
        crashgen_version: &str,
    ) -> ScanResult<PluginList> {
        let mut list = PluginList::default();
        let Some(lines) = lines else {
            tracing::debug!("No plugin segment present");
            return Ok(list);
        };

        let mut seen = HashSet::new();
        let mut parsed_any = false;

        for line in lines {
            let line = line.as_ref();
            let Some(caps) = self.entry_pattern.captures(line) else {
                continue;
            };
            parsed_any = true;

            let prefix = caps[1].to_uppercase();
            let file_name = caps[3].trim().to_string();
            let flags = caps.get(4).map(|m| m.as_str().to_string());

            let (load_order, light_index) = match caps.get(2) {
                Some(light) => (
                    LIGHT_PLUGIN_INDEX,
                    u16::from_str_radix(light.as_str(), 16).ok(),
                ),
                None => match u8::from_str_radix(&prefix, 16) {
                    Ok(index) => (index, None),
                    Err(_) => continue,
                },
            };

            if light_index.is_none() && load_order == context.limits.limit_marker {
                if context.limit_marker_unreliable(game_version, crashgen_version) {
                    list.limit.limit_check_disabled = true;
                } else {
                    list.limit.reached_limit = true;
                }
                continue;
            }

            if !seen.insert(file_name.to_lowercase()) {
                tracing::debug!("Duplicate plugin entry skipped: {}", file_name);
                continue;
            }

            list.plugins
                .push(Plugin::new(file_name, load_order, light_index).with_flags(flags));
        }

        if !lines.is_empty() && !parsed_any {
            return Err(ScanError::partial(
                "plugin",
                format!("{} lines in the plugin segment, none parseable", lines.len()),
            ));
        }

        list.limit.plugins_loaded = !list.plugins.is_empty();
        let full_plugins = list.plugins.iter().filter(|p| !p.is_light()).count();
        if full_plugins > usize::from(context.limits.max_full_plugins) {
            tracing::warn!(
                "{} full plugins loaded, more than the {} the game supports",
                full_plugins,
                context.limits.max_full_plugins
            );
            list.limit.reached_limit = true;
        }
        Ok(list)
    }

    /// DLL names from the script extender plugin segment, lowercased and
    /// without their version suffix.
    pub fn xse_modules<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        let mut modules = Vec::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            let name = self.module_version.replace(line, "").to_lowercase();
            if name.ends_with(".dll") && !modules.contains(&name) {
                modules.push(name);
            }
        }
        modules
    }
}

/// Plugin list from `loadorder.txt` text.
///
/// The first line is the file's header and is skipped. Each remaining
/// non-blank line is a plugin name; repeats are dropped.
pub fn parse_load_order<S: AsRef<str>>(lines: &[S]) -> PluginList {
    let mut list = PluginList::default();
    let mut seen = HashSet::new();

    for line in lines.iter().skip(1) {
        let name = line.as_ref().trim();
        if name.is_empty() || !seen.insert(name.to_lowercase()) {
            continue;
        }
        list.plugins.push(Plugin::from_load_order_file(name));
    }

    list.limit.plugins_loaded = !list.plugins.is_empty();
    list
}

/// Read a `loadorder.txt` file that replaces the plugin list of every log.
pub fn read_load_order_file(path: &Utf8Path) -> ScanResult<PluginList> {
    let bytes = std::fs::read(path).map_err(|e| ScanError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let list = parse_load_order(&lines);
    tracing::info!("Read {} plugins from {}", list.plugins.len(), path);
    Ok(list)
}

/// Count plugins named in call-stack lines.
///
/// Lines containing `modified by:` list every plugin touching a record and
/// are skipped; plugins on `ignore` never count. Result follows the plugin
/// list order.
pub fn find_plugin_suspects<'a, S: AsRef<str>>(
    stack_lines: impl IntoIterator<Item = S>,
    plugins: &'a [Plugin],
    ignore: &[String],
) -> Vec<(&'a Plugin, usize)> {
    let ignore: HashSet<String> = ignore.iter().map(|p| p.to_lowercase()).collect();
    let candidates: Vec<(&Plugin, String)> = plugins
        .iter()
        .map(|p| (p, p.file_name.to_lowercase()))
        .filter(|(_, lower)| !ignore.contains(lower))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in stack_lines {
        let line = line.as_ref().to_lowercase();
        if line.contains("modified by:") {
            continue;
        }
        for (plugin, lower) in &candidates {
            if line.contains(lower.as_str()) {
                *counts.entry(plugin.file_name.as_str()).or_default() += 1;
            }
        }
    }

    candidates
        .into_iter()
        .filter_map(|(plugin, _)| counts.get(plugin.file_name.as_str()).map(|c| (plugin, *c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PluginLimits, ScanDatabase};

    fn context() -> GameContext {
        GameContext::new(&ScanDatabase::minimal().game, false, PluginLimits::default())
    }

    fn extract(lines: &[&str]) -> ScanResult<PluginList> {
        PluginExtractor::new().extract(
            Some(lines),
            &context(),
            "Fallout 4 v1.10.163",
            "Buffout 4 v1.28.6",
        )
    }

    #[test]
    fn test_extract_regular_and_light() {
        let list = extract(&[
            "\t[00]     Fallout4.esm",
            "\t[05]     SomeMod.esp",
            "\t[FE:001] Tiny.esl",
            "\t[0A]     Flagged.esp [ESM]",
        ])
        .unwrap();

        assert_eq!(list.plugins.len(), 4);
        assert_eq!(list.plugins[1].file_name, "SomeMod.esp");
        assert_eq!(list.plugins[1].load_order, 5);
        assert_eq!(list.plugins[2].light_index, Some(1));
        assert_eq!(list.plugins[3].flags.as_deref(), Some("ESM"));
        assert!(list.limit.plugins_loaded);
        assert!(!list.limit.reached_limit);
    }

    #[test]
    fn test_limit_marker_adds_no_plugin() {
        let list = extract(&["\t[00] Fallout4.esm", "\t[FF] Overflow.esp"]).unwrap();
        assert_eq!(list.plugins.len(), 1);
        assert!(list.limit.reached_limit);
        assert!(!list.limit.limit_check_disabled);
    }

    #[test]
    fn test_limit_marker_unreliable_on_new_game() {
        let list = PluginExtractor::new()
            .extract(
                Some(&["\t[FF] Overflow.esp"][..]),
                &context(),
                "Fallout 4 v1.10.984",
                "Buffout 4 v1.35.1",
            )
            .unwrap();
        assert!(list.limit.limit_check_disabled);
        assert!(!list.limit.reached_limit);
    }

    #[test]
    fn test_absent_segment_not_loaded() {
        let list = PluginExtractor::new()
            .extract::<&str>(None, &context(), "", "")
            .unwrap();
        assert!(!list.limit.plugins_loaded);
        assert!(list.plugins.is_empty());
    }

    #[test]
    fn test_unparseable_segment_is_partial() {
        let result = extract(&["garbage", "more garbage"]);
        assert!(matches!(result, Err(ScanError::PartialExtraction { .. })));
    }

    #[test]
    fn test_duplicates_skipped() {
        let list = extract(&["[01] A.esp", "[02] a.esp"]).unwrap();
        assert_eq!(list.plugins.len(), 1);
    }

    #[test]
    fn test_full_plugin_ceiling() {
        let limits = PluginLimits {
            max_full_plugins: 1,
            ..PluginLimits::default()
        };
        let context = GameContext::new(&ScanDatabase::minimal().game, false, limits);
        let list = PluginExtractor::new()
            .extract(Some(&["[00] A.esm", "[01] B.esp", "[FE:000] C.esl"][..]), &context, "", "")
            .unwrap();
        assert!(list.limit.reached_limit);
        assert_eq!(list.plugins.len(), 3);
    }

    #[test]
    fn test_xse_modules() {
        let modules = PluginExtractor::new().xse_modules(&[
            "\tBuffout4.dll v1.28.6",
            "\tx-cell-fo4.dll v2.0",
            "\tf4ee.dll",
            "",
        ]);
        assert_eq!(modules, vec!["buffout4.dll", "x-cell-fo4.dll", "f4ee.dll"]);
    }

    #[test]
    fn test_load_order_file_skips_header() {
        let list = parse_load_order(&[
            "# This file was automatically generated by Vortex",
            "Fallout4.esm",
            "",
            "  SomeMod.esp  ",
            "somemod.esp",
        ]);
        let names: Vec<_> = list.plugins.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["Fallout4.esm", "SomeMod.esp"]);
        assert!(list.limit.plugins_loaded);
        assert!(!list.plugins[1].has_known_index());
    }

    #[test]
    fn test_header_only_load_order_not_loaded() {
        let list = parse_load_order(&["# header"]);
        assert!(!list.limit.plugins_loaded);
    }

    #[test]
    fn test_missing_load_order_file_is_io_error() {
        let result = read_load_order_file(Utf8Path::new("/nonexistent/loadorder.txt"));
        assert!(matches!(result, Err(ScanError::Io { .. })));
    }

    #[test]
    fn test_plugin_suspects() {
        let plugins = vec![
            Plugin::new("Fallout4.esm", 0, None),
            Plugin::new("SomeMod.esp", 5, None),
        ];
        let stack = [
            "\t[0] 0x1 SomeMod.esp+12",
            "\tFile: \"Fallout4.esm\"",
            "\tModified by: SomeMod.esp",
        ];
        let suspects = find_plugin_suspects(stack, &plugins, &["Fallout4.esm".to_string()]);
        assert_eq!(suspects.len(), 1);
        assert_eq!(suspects[0].0.file_name, "SomeMod.esp");
        assert_eq!(suspects[0].1, 1);
    }
}
