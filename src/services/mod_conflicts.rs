use crate::models::database::split_key;
use crate::models::{
    ConflictType, GpuVendor, ModCompatibility, ModConflictDatabase, ModConflictResult, ModEntry,
    Plugin,
};
use indexmap::IndexMap;

/// Lowercase and drop everything that is not a letter or digit.
pub fn normalize_mod_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where an installed mod was found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Presence {
    /// Plugin at this position in the load order, with its label
    Plugin(usize, String),
    /// Script extender DLL
    Module,
}

impl Presence {
    fn plugin_id(&self) -> String {
        match self {
            Presence::Plugin(_, label) => label.clone(),
            Presence::Module => String::new(),
        }
    }
}

/// Installed plugins and script extender modules, normalized once per log.
pub struct InstalledMods {
    plugins: Vec<(String, String)>,
    modules: Vec<String>,
}

impl InstalledMods {
    pub fn new(plugins: &[Plugin], xse_modules: &[String]) -> Self {
        Self {
            plugins: plugins
                .iter()
                .map(|p| (normalize_mod_name(&p.file_name), p.load_order_label()))
                .collect(),
            modules: xse_modules.iter().map(|m| normalize_mod_name(m)).collect(),
        }
    }

    fn find(&self, key: &str) -> Option<Presence> {
        let key = normalize_mod_name(key);
        if key.is_empty() {
            return None;
        }
        if let Some((index, (_, label))) = self
            .plugins
            .iter()
            .enumerate()
            .find(|(_, (name, _))| name.contains(&key))
        {
            return Some(Presence::Plugin(index, label.clone()));
        }
        self.modules
            .iter()
            .any(|m| m.contains(&key))
            .then_some(Presence::Module)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }
}

/// `"<detection key> | <display name>"`, or a bare key used for both.
fn key_and_name(key: &str) -> (&str, &str) {
    split_key(key).unwrap_or((key.trim(), key.trim()))
}

/// GPU constraint outcome for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GpuFit {
    Unconstrained,
    Matches,
    Mismatch,
    /// Constrained entry but the GPU is unknown
    Undetermined,
}

fn gpu_fit(entry: &ModEntry, gpu: GpuVendor) -> GpuFit {
    match entry.gpu() {
        None => GpuFit::Unconstrained,
        Some(_) if gpu == GpuVendor::Unknown => GpuFit::Undetermined,
        Some(required) if required == gpu => GpuFit::Matches,
        Some(_) => GpuFit::Mismatch,
    }
}

fn result(
    mod_name: &str,
    plugin_id: String,
    entry: &ModEntry,
    conflict_type: ConflictType,
) -> ModConflictResult {
    ModConflictResult {
        mod_name: mod_name.to_string(),
        plugin_id,
        warning: entry.warning().to_string(),
        solution: entry.solution().unwrap_or_default().to_string(),
        severity: entry.severity().unwrap_or(conflict_type.default_severity()),
        conflict_type,
    }
}

/// Check installed mods against every database category.
///
/// Categories are independent: one mod can produce hits in several of them.
/// GPU-constrained entries only apply when the detected vendor matches; for
/// core mods a mismatch on an installed mod is reported as incompatible.
pub fn detect_mod_conflicts(
    database: &ModConflictDatabase,
    installed: &InstalledMods,
    gpu: GpuVendor,
) -> ModCompatibility {
    let mut compatibility = ModCompatibility::default();

    for (key, entry) in &database.core {
        let (detect, name) = key_and_name(key);
        let fit = gpu_fit(entry, gpu);
        match (installed.find(detect), fit) {
            (_, GpuFit::Undetermined) => {}
            (Some(presence), GpuFit::Mismatch) => compatibility.issues.push(result(
                name,
                presence.plugin_id(),
                entry,
                ConflictType::GpuIncompatible,
            )),
            (Some(_), _) => compatibility.installed_important.push(name.to_string()),
            (None, GpuFit::Mismatch) => {}
            (None, _) => compatibility.issues.push(result(
                name,
                String::new(),
                entry,
                ConflictType::MissingImportant,
            )),
        }
    }

    let mut single = |table: &IndexMap<String, ModEntry>, conflict_type: ConflictType| {
        for (key, entry) in table {
            if !matches!(gpu_fit(entry, gpu), GpuFit::Unconstrained | GpuFit::Matches) {
                continue;
            }
            let (detect, name) = key_and_name(key);
            if let Some(presence) = installed.find(detect) {
                compatibility
                    .issues
                    .push(result(name, presence.plugin_id(), entry, conflict_type));
            }
        }
    };
    single(&database.frequent, ConflictType::FrequentCrash);
    single(&database.solutions, ConflictType::HasSolution);

    for (key, entry) in &database.conflicts {
        if !matches!(gpu_fit(entry, gpu), GpuFit::Unconstrained | GpuFit::Matches) {
            continue;
        }
        let Some((first, second)) = split_key(key) else {
            tracing::warn!("Skipping conflict entry with malformed key: {:?}", key);
            continue;
        };
        if let (Some(a), Some(_)) = (installed.find(first), installed.find(second)) {
            compatibility.issues.push(result(
                &format!("{} + {}", first, second),
                a.plugin_id(),
                entry,
                ConflictType::ModPairConflict,
            ));
        }
    }

    for (key, entry) in &database.load_order {
        let Some((earlier, later)) = split_key(key) else {
            tracing::warn!("Skipping load order entry with malformed key: {:?}", key);
            continue;
        };
        if let (Some(Presence::Plugin(a, label)), Some(Presence::Plugin(b, _))) =
            (installed.find(earlier), installed.find(later))
        {
            if a < b {
                compatibility.issues.push(result(
                    &format!("{} before {}", earlier, later),
                    label,
                    entry,
                    ConflictType::LoadOrderIssue,
                ));
            }
        }
    }

    compatibility
}
