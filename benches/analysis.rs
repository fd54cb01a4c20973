use autoscan::report::{self, ReportOptions, ReportStrategy};
use autoscan::{Analyzer, ScanDatabase, ScanSettings};
use camino::Utf8PathBuf;
use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write;
use std::hint::black_box;
use std::sync::Arc;

/// A crash log with `plugins` plugins and a call stack that names some of them.
fn synthetic_log(plugins: usize) -> String {
    let mut log = String::from(
        "Fallout 4 v1.10.163\n\
         Buffout 4 v1.31.1\n\
         \n\
         Unhandled exception \"EXCEPTION_ACCESS_VIOLATION\" at 0x7FF6A1B2C3D4 Fallout4.exe+0123456\n\
         \n\
         \t[Patches]\n\
         \t\tArchiveLimit: false\n\
         \t\tMemoryManager: true\n\
         SYSTEM SPECS:\n\
         \tGPU #1: Nvidia GA102 [GeForce RTX 3080]\n\
         PROBABLE CALL STACK:\n",
    );
    for i in 0..plugins * 4 {
        let _ = writeln!(log, "\t[{i}] 0x7FF6A1B2{i:04X} Fallout4.exe+{i:07X} Mod{:03}.esp", i % plugins);
    }
    log.push_str("STACK:\n");
    for i in 0..plugins {
        let _ = writeln!(log, "\t[RSP+{:<4}] 0x1A2B3C4D5E6F      (TESObjectREFR*)", i * 8);
        let _ = writeln!(log, "\t\tForm ID: 0x{:02X}00{:04X}", i % 0xFD, i);
    }
    log.push_str("PLUGINS:\n\t[00]     Fallout4.esm\n");
    for i in 0..plugins {
        let _ = writeln!(log, "\t[{:02X}]     Mod{:03}.esp", (i + 1) % 0xFD, i);
    }
    log
}

fn bench_analysis(c: &mut Criterion) {
    let analyzer = Analyzer::new(Arc::new(ScanDatabase::packaged()), &ScanSettings::default());
    let options = ReportOptions::default();

    for plugins in [20, 200] {
        let text = synthetic_log(plugins);

        c.bench_function(&format!("parse_{plugins}_plugins"), |b| {
            b.iter(|| analyzer.parse_text(Utf8PathBuf::from("crash-bench.log"), black_box(&text)))
        });

        let log = analyzer.parse_text(Utf8PathBuf::from("crash-bench.log"), &text);
        c.bench_function(&format!("analyze_{plugins}_plugins"), |b| {
            b.iter(|| analyzer.analyze_with(black_box(&log), None))
        });

        let result = analyzer.analyze_with(&log, None);
        c.bench_function(&format!("render_{plugins}_plugins"), |b| {
            b.iter(|| report::render(black_box(&result), ReportStrategy::Enhanced, &options))
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_analysis
}

criterion_main!(benches);
