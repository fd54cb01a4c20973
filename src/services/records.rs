use crate::models::{GpuInfo, GpuVendor, NamedRecord, RecordLists};
use std::collections::BTreeMap;

/// Stack dump lines carry a fixed-width `[RSP+xxx] 0x...` prefix.
const RSP_MARKER: &str = "[RSP+";
const RSP_PREFIX_WIDTH: usize = 30;

/// Named records in stack lines, counted and sorted by name.
///
/// A line qualifies when it contains any `check` marker and none of the
/// `exclude` markers (both case-insensitive).
pub fn find_named_records<S: AsRef<str>>(
    stack_lines: impl IntoIterator<Item = S>,
    lists: &RecordLists,
) -> Vec<NamedRecord> {
    let check: Vec<String> = lists.check.iter().map(|r| r.to_lowercase()).collect();
    let exclude: Vec<String> = lists.exclude.iter().map(|r| r.to_lowercase()).collect();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for line in stack_lines {
        let line = line.as_ref();
        let lower = line.to_lowercase();
        if !check.iter().any(|r| lower.contains(r.as_str())) {
            continue;
        }
        if exclude.iter().any(|r| lower.contains(r.as_str())) {
            continue;
        }

        let record = if line.contains(RSP_MARKER) {
            line.get(RSP_PREFIX_WIDTH..).unwrap_or_default()
        } else {
            line
        };
        let record = record.trim();
        if !record.is_empty() {
            *counts.entry(record.to_string()).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .map(|(name, count)| NamedRecord { name, count })
        .collect()
}

/// GPU vendor and names from the SYSTEM SPECS segment.
pub fn detect_gpu<S: AsRef<str>>(system_lines: &[S]) -> GpuInfo {
    let mut info = GpuInfo::default();

    for line in system_lines {
        let line = line.as_ref();
        let name = line.split_once(':').map(|(_, name)| name.trim().to_string());
        if line.contains("GPU #1") {
            info.vendor = if line.contains("AMD") {
                GpuVendor::Amd
            } else if line.contains("Nvidia") || line.contains("NVIDIA") {
                GpuVendor::Nvidia
            } else if line.contains("Intel") {
                GpuVendor::Intel
            } else {
                GpuVendor::Unknown
            };
            info.rival = info.vendor.rival();
            info.primary = name;
        } else if line.contains("GPU #2") {
            info.secondary = name;
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists() -> RecordLists {
        RecordLists {
            check: vec![".nif".to_string(), "name:".to_string()],
            exclude: vec!["ntdll".to_string(), ".esp".to_string()],
        }
    }

    #[test]
    fn test_named_records_counted_and_sorted() {
        let lines = [
            "\t[RSP+68  ] 0x2A6F5E81E40      (char*) \"Meshes\\Armor\\Helmet.nif\"",
            "\t[RSP+68  ] 0x2A6F5E81E40      (char*) \"Meshes\\Armor\\Helmet.nif\"",
            "\t\tName: \"Alpha\"",
            "\t\tName: \"Plugin.esp\"",
            "\t[0] 0x7FF ntdll.dll+1 Something.nif",
        ];
        let records = find_named_records(lines, &lists());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "(char*) \"Meshes\\Armor\\Helmet.nif\"");
        assert_eq!(records[0].count, 2);
        assert_eq!(records[1].name, "Name: \"Alpha\"");
    }

    #[test]
    fn test_short_rsp_line_is_dropped() {
        let records = find_named_records(["[RSP+0] a.nif"], &lists());
        assert!(records.is_empty());
    }

    #[test]
    fn test_detect_gpu() {
        let info = detect_gpu(&[
            "\tCPU: AuthenticAMD AMD Ryzen 7 5800X",
            "\tGPU #1: Nvidia GA102 [GeForce RTX 3080]",
            "\tGPU #2: AMD Radeon Graphics",
        ]);
        assert_eq!(info.vendor, GpuVendor::Nvidia);
        assert_eq!(info.rival, Some(GpuVendor::Amd));
        assert_eq!(info.primary.as_deref(), Some("Nvidia GA102 [GeForce RTX 3080]"));
        assert_eq!(info.secondary.as_deref(), Some("AMD Radeon Graphics"));
    }

    #[test]
    fn test_unknown_gpu() {
        let info = detect_gpu::<&str>(&[]);
        assert_eq!(info.vendor, GpuVendor::Unknown);
        assert_eq!(info.rival, None);
    }
}
