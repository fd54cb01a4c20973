//! Crash generator settings validation.
//!
//! Each [`SettingRule`] names a setting, its expected value and the condition
//! under which the expectation applies. The memory manager check is special:
//! X-Cell and Baka ScrapHeap both replace allocators the crash generator also
//! patches, so that combination is decided before the generic rules run.

use crate::config::{ConfigValue, ConfigValueError, ConfigValueReader, ConfigValueWriter};
use crate::models::{SettingIssue, SettingIssueKind, SettingsValidationResult};

pub const XCELL_MODULES: &[&str] = &["x-cell-fo4.dll", "x-cell-og.dll", "x-cell-ng2.dll"];
pub const BAKA_SCRAPHEAP_MODULE: &str = "bakascrapheap.dll";

const MEMORY_MANAGER_KEY: &str = "MemoryManager";
const PATCHES_SECTION: &str = "Patches";

/// When a rule's expectation applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Always,
    /// Any of these script extender modules is installed
    Installed(&'static [&'static str]),
    /// None of these modules is installed
    NotInstalled(&'static [&'static str]),
}

impl Trigger {
    fn holds(&self, modules: &[String]) -> bool {
        let installed = |names: &[&str]| names.iter().any(|n| modules.iter().any(|m| m == n));
        match self {
            Trigger::Always => true,
            Trigger::Installed(names) => installed(names),
            Trigger::NotInstalled(names) => !installed(names),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingRule {
    pub section: &'static str,
    pub key: &'static str,
    pub expected: ConfigValue,
    pub trigger: Trigger,
    pub severity: u8,
    pub message: String,
    pub fix: String,
    pub passed: String,
}

/// Built-in rules for the crash generator.
pub fn default_rules(crashgen: &str) -> Vec<SettingRule> {
    let mut rules = vec![
        SettingRule {
            section: PATCHES_SECTION,
            key: "Achievements",
            expected: ConfigValue::Bool(false),
            trigger: Trigger::Installed(&["achievements.dll", "unlimitedsurvivalmode.dll"]),
            severity: 4,
            message: "The Achievements Mod and/or Unlimited Survival Mode is installed, but Achievements is set to TRUE".to_string(),
            fix: format!("Open {crashgen}'s TOML file and change Achievements to FALSE, this prevents conflicts with {crashgen}."),
            passed: format!("Achievements parameter is correctly configured in your {crashgen} settings!"),
        },
        SettingRule {
            section: PATCHES_SECTION,
            key: "ArchiveLimit",
            expected: ConfigValue::Bool(false),
            trigger: Trigger::Always,
            severity: 4,
            message: "ArchiveLimit is set to TRUE, this setting is known to cause instability.".to_string(),
            fix: format!("Open {crashgen}'s TOML file and change ArchiveLimit to FALSE."),
            passed: format!("ArchiveLimit parameter is correctly configured in your {crashgen} settings!"),
        },
        SettingRule {
            section: "Compatibility",
            key: "F4EE",
            expected: ConfigValue::Bool(true),
            trigger: Trigger::Installed(&["f4ee.dll"]),
            severity: 3,
            message: "Looks Menu is installed, but F4EE parameter under [Compatibility] is set to FALSE".to_string(),
            fix: format!("Open {crashgen}'s TOML file and change F4EE to TRUE, this prevents bugs and crashes from Looks Menu."),
            passed: format!("F4EE (Looks Menu) parameter is correctly configured in your {crashgen} settings!"),
        },
    ];

    for (key, display) in [
        ("HavokMemorySystem", "Havok Memory System"),
        ("BSTextureStreamerLocalHeap", "BSTextureStreamerLocalHeap"),
        ("ScaleformAllocator", "Scaleform Allocator"),
        ("SmallBlockAllocator", "Small Block Allocator"),
    ] {
        rules.push(SettingRule {
            section: PATCHES_SECTION,
            key,
            expected: ConfigValue::Bool(false),
            trigger: Trigger::Installed(XCELL_MODULES),
            severity: 4,
            message: format!("X-Cell is installed, but {key} parameter is set to TRUE"),
            fix: format!("Open {crashgen}'s TOML file and change {key} to FALSE, this prevents conflicts with X-Cell."),
            passed: format!("{display} parameter is correctly configured for use with X-Cell in your {crashgen} settings!"),
        });
    }

    rules
}

pub struct SettingsValidator {
    crashgen_name: String,
    rules: Vec<SettingRule>,
    ignore: Vec<String>,
}

impl SettingsValidator {
    pub fn new(crashgen_name: &str, ignore: &[String]) -> Self {
        Self::with_rules(crashgen_name, default_rules(crashgen_name), ignore)
    }

    pub fn with_rules(crashgen_name: &str, rules: Vec<SettingRule>, ignore: &[String]) -> Self {
        Self {
            crashgen_name: crashgen_name.to_string(),
            rules,
            ignore: ignore.to_vec(),
        }
    }

    /// Check settings against the rules for the installed modules.
    ///
    /// A reader with no settings yields an unchecked, empty result.
    pub fn validate(&self, reader: &dyn ConfigValueReader, modules: &[String]) -> SettingsValidationResult {
        let entries = reader.entries();
        if entries.is_empty() {
            tracing::debug!("No crash generator settings available, skipping validation");
            return SettingsValidationResult::default();
        }

        let mut result = SettingsValidationResult {
            checked: true,
            ..Default::default()
        };

        self.check_memory_management(reader, modules, &mut result);

        for rule in &self.rules {
            if !rule.trigger.holds(modules) {
                continue;
            }
            let Some(actual) = reader.get(rule.section, rule.key) else {
                tracing::debug!("Setting {} not present, rule skipped", rule.key);
                continue;
            };
            if actual.matches(&rule.expected) {
                result.passed.push(rule.passed.clone());
            } else {
                result.issues.push(SettingIssue {
                    section: rule.section.to_string(),
                    key: rule.key.to_string(),
                    expected: rule.expected.to_string(),
                    actual: Some(actual.to_string()),
                    kind: SettingIssueKind::Mismatch,
                    severity: rule.severity,
                    message: rule.message.clone(),
                    fix: rule.fix.clone(),
                    fixed: false,
                });
            }
        }

        for entry in entries {
            if entry.value == ConfigValue::Bool(false) && !self.ignore.iter().any(|i| *i == entry.key) {
                result.disabled.push(entry.key);
            }
        }

        result
    }

    /// Validate, then write the expected value for every mismatch and save.
    pub fn validate_and_fix<W: ConfigValueWriter>(
        &self,
        writer: &mut W,
        modules: &[String],
    ) -> Result<SettingsValidationResult, ConfigValueError> {
        let mut result = self.validate(&*writer, modules);

        let mut changed = false;
        for issue in result
            .issues
            .iter_mut()
            .filter(|i| i.kind == SettingIssueKind::Mismatch)
        {
            writer.set(&issue.section, &issue.key, ConfigValue::parse(&issue.expected))?;
            issue.fixed = true;
            changed = true;
            tracing::info!("Set {} to {}", issue.key, issue.expected);
        }

        if changed {
            writer.save()?;
        }
        Ok(result)
    }

    fn check_memory_management(
        &self,
        reader: &dyn ConfigValueReader,
        modules: &[String],
        result: &mut SettingsValidationResult,
    ) {
        let crashgen = &self.crashgen_name;
        let has_xcell = Trigger::Installed(XCELL_MODULES).holds(modules);
        let has_baka = modules.iter().any(|m| m == BAKA_SCRAPHEAP_MODULE);
        let actual = reader.get(PATCHES_SECTION, MEMORY_MANAGER_KEY);
        let enabled = actual.as_ref().and_then(ConfigValue::as_bool).unwrap_or(false);

        let redundant = |with: &str, fix: String| SettingIssue {
            section: PATCHES_SECTION.to_string(),
            key: MEMORY_MANAGER_KEY.to_string(),
            expected: String::new(),
            actual: actual.as_ref().map(ToString::to_string),
            kind: SettingIssueKind::Redundant,
            severity: 4,
            message: format!("The Baka ScrapHeap Mod is installed, but is redundant with {with}"),
            fix,
            fixed: false,
        };

        match (enabled, has_xcell, has_baka) {
            (true, true, _) => result.issues.push(SettingIssue {
                section: PATCHES_SECTION.to_string(),
                key: MEMORY_MANAGER_KEY.to_string(),
                expected: ConfigValue::Bool(false).to_string(),
                actual: actual.as_ref().map(ToString::to_string),
                kind: SettingIssueKind::Mismatch,
                severity: 5,
                message: "X-Cell is installed, but MemoryManager parameter is set to TRUE".to_string(),
                fix: format!("Open {crashgen}'s TOML file and change MemoryManager to FALSE, this prevents conflicts with X-Cell."),
                fixed: false,
            }),
            (true, false, true) => result.issues.push(redundant(
                crashgen,
                format!("Uninstall the Baka ScrapHeap Mod, this prevents conflicts with {crashgen}."),
            )),
            (true, false, false) => result.passed.push(format!(
                "Memory Manager parameter is correctly configured in your {crashgen} settings!"
            )),
            (false, true, true) => result.issues.push(redundant(
                "X-Cell",
                "Uninstall the Baka ScrapHeap Mod, this prevents conflicts with X-Cell.".to_string(),
            )),
            (false, true, false) => result.passed.push(format!(
                "Memory Manager parameter is correctly configured for use with X-Cell in your {crashgen} settings!"
            )),
            (false, false, true) => result.issues.push(redundant(
                crashgen,
                format!("Uninstall the Baka ScrapHeap Mod and open {crashgen}'s TOML file and change MemoryManager to TRUE, this improves performance."),
            )),
            (false, false, false) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::crashgen::MockConfigValueReader;
    use crate::config::{ConfigEntry, LogSettingsReader, TomlConfigFile};
    use camino::Utf8PathBuf;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn validator() -> SettingsValidator {
        SettingsValidator::new("Buffout 4", &["F4EE".to_string()])
    }

    fn modules(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn reader(lines: &[&str]) -> LogSettingsReader {
        LogSettingsReader::from_lines(lines)
    }

    #[test]
    fn test_trigger_holds() {
        let installed = modules(&["f4ee.dll"]);
        assert!(Trigger::Always.holds(&[]));
        assert!(Trigger::Installed(&["f4ee.dll"]).holds(&installed));
        assert!(!Trigger::NotInstalled(&["f4ee.dll"]).holds(&installed));
        assert!(Trigger::NotInstalled(XCELL_MODULES).holds(&installed));
    }

    #[test]
    fn test_empty_reader_is_unchecked() {
        let mut mock = MockConfigValueReader::new();
        mock.expect_entries().returning(Vec::new);
        mock.expect_get().never();

        let result = validator().validate(&mock, &[]);
        assert!(!result.checked);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_mismatch_and_pass() {
        let settings = reader(&["[Patches]", "ArchiveLimit: true", "MemoryManager: true"]);
        let result = validator().validate(&settings, &[]);

        assert!(result.checked);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].key, "ArchiveLimit");
        assert_eq!(result.issues[0].severity, 4);
        assert_eq!(result.issues[0].actual.as_deref(), Some("TRUE"));
        assert!(result.passed.iter().any(|p| p.contains("Memory Manager")));
    }

    #[test]
    fn test_trigger_not_holding_skips_rule() {
        let settings = reader(&["[Patches]", "Achievements: true", "ArchiveLimit: false"]);
        let result = validator().validate(&settings, &[]);
        assert!(result.issues.is_empty());

        let result = validator().validate(&settings, &modules(&["achievements.dll"]));
        assert_eq!(result.issues[0].key, "Achievements");
    }

    #[test]
    fn test_xcell_with_memory_manager() {
        let settings = reader(&["[Patches]", "MemoryManager: true", "ScaleformAllocator: true"]);
        let result = validator().validate(&settings, &modules(&["x-cell-fo4.dll"]));

        let keys: Vec<_> = result.issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["MemoryManager", "ScaleformAllocator"]);
        assert_eq!(result.issues[0].severity, 5);
    }

    #[test]
    fn test_baka_redundant_short_circuits() {
        let settings = reader(&["[Patches]", "MemoryManager: false"]);
        let result = validator().validate(
            &settings,
            &modules(&["x-cell-fo4.dll", BAKA_SCRAPHEAP_MODULE]),
        );
        assert_eq!(result.issues[0].kind, SettingIssueKind::Redundant);
        assert!(result.issues[0].message.ends_with("redundant with X-Cell"));

        let settings = reader(&["[Patches]", "MemoryManager: true"]);
        let result = validator().validate(&settings, &modules(&[BAKA_SCRAPHEAP_MODULE]));
        assert!(result.issues[0].message.ends_with("redundant with Buffout 4"));
    }

    #[test]
    fn test_disabled_settings_notice() {
        let settings = reader(&["F4EE: false", "[Fixes]", "ActorIsHostileToActor: false", "MaxStdIO: 2048"]);
        let result = validator().validate(&settings, &[]);
        assert_eq!(result.disabled, vec!["ActorIsHostileToActor"]);
    }

    #[test]
    fn test_mock_reader_values() {
        let mut mock = MockConfigValueReader::new();
        mock.expect_entries().returning(|| {
            vec![ConfigEntry {
                section: "Patches".to_string(),
                key: "ArchiveLimit".to_string(),
                value: ConfigValue::Integer(1),
            }]
        });
        mock.expect_get()
            .returning(|_, key| (key == "ArchiveLimit").then_some(ConfigValue::Integer(1)));

        let result = validator().validate(&mock, &[]);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].actual.as_deref(), Some("1"));
    }

    #[test]
    fn test_validate_and_fix_writes_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[Patches]\nArchiveLimit = true\nMemoryManager = true").unwrap();
        temp_file.flush().unwrap();
        let path = Utf8PathBuf::try_from(temp_file.path().to_path_buf()).unwrap();

        let mut file = TomlConfigFile::load(&path).unwrap();
        let result = validator().validate_and_fix(&mut file, &[]).unwrap();
        assert!(result.issues.iter().all(|i| i.fixed));

        let reloaded = TomlConfigFile::load(&path).unwrap();
        assert_eq!(
            reloaded.get("Patches", "ArchiveLimit"),
            Some(ConfigValue::Bool(false))
        );
    }
}
