//! Resource monitoring for batch scans.
//!
//! Samples system CPU and memory plus this process's working set, and sizes
//! the worker pool from those samples. Adjustments are best effort: a shrink
//! only takes permits that are free at the time.

use crate::batch::ResultCache;
use crate::metrics::ScanMetrics;
use crate::state::StateManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, ProcessesToUpdate, RefreshKind, System};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

/// Time between samples while a batch runs.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// CPU usage above which the machine counts as busy.
pub const HIGH_CPU_PERCENT: f32 = 85.0;
/// Memory usage above which the machine counts as busy.
pub const HIGH_MEMORY_PERCENT: f32 = 85.0;
/// CPU usage below which the machine counts as idle.
pub const LIGHT_CPU_PERCENT: f32 = 50.0;

/// One resource reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    /// Working set of this process in bytes
    pub process_memory: u64,
    /// Workers holding a permit
    pub busy_workers: usize,
    pub workers: usize,
}

impl ResourceSample {
    pub fn under_pressure(&self) -> bool {
        self.cpu_percent >= HIGH_CPU_PERCENT || self.memory_percent >= HIGH_MEMORY_PERCENT
    }

    pub fn is_light(&self) -> bool {
        self.cpu_percent < LIGHT_CPU_PERCENT && self.memory_percent < HIGH_MEMORY_PERCENT
    }

    /// Fraction of workers busy, 0 when there are none.
    pub fn saturation(&self) -> f32 {
        if self.workers == 0 {
            0.0
        } else {
            self.busy_workers as f32 / self.workers as f32
        }
    }
}

/// Worker count for the next interval.
///
/// Halves under pressure, doubles back toward `ceiling` when every worker is
/// busy on an idle machine, otherwise keeps `current`.
pub fn recommend_workers(sample: &ResourceSample, current: usize, ceiling: usize) -> usize {
    if sample.under_pressure() {
        (current / 2).max(1)
    } else if sample.is_light() && sample.saturation() >= 1.0 && current < ceiling {
        (current * 2).min(ceiling)
    } else {
        current
    }
}

/// Reads system and process resource usage.
pub struct ResourceMonitor {
    system: System,
    pid: Option<Pid>,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // CPU usage is a delta; the first refresh only sets the baseline
        system.refresh_cpu_usage();

        let pid = sysinfo::get_current_pid()
            .inspect_err(|e| tracing::debug!("Process memory unavailable: {}", e))
            .ok();

        Self { system, pid }
    }

    pub fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total_memory = self.system.total_memory();
        let memory_percent = if total_memory > 0 {
            self.system.used_memory() as f32 / total_memory as f32 * 100.0
        } else {
            0.0
        };

        let process_memory = self.pid.map_or(0, |pid| {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            self.system.process(pid).map_or(0, |process| process.memory())
        });

        ResourceSample {
            cpu_percent: self.system.global_cpu_usage(),
            memory_percent,
            process_memory,
            ..Default::default()
        }
    }

    /// Sample again after the minimum interval CPU usage needs to be meaningful.
    pub async fn settled_sample(&mut self) -> ResourceSample {
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        self.sample()
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Resizable limit on concurrently running analyses.
#[derive(Debug)]
pub struct WorkerLimiter {
    semaphore: Arc<Semaphore>,
    size: AtomicUsize,
    ceiling: usize,
}

impl WorkerLimiter {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size: AtomicUsize::new(size),
            ceiling: size,
        }
    }

    pub fn semaphore(&self) -> Arc<Semaphore> {
        Arc::clone(&self.semaphore)
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Size the limiter started with; growth never exceeds it.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn busy(&self) -> usize {
        self.size()
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Move toward `target` workers and return the size reached.
    pub fn resize(&self, target: usize) -> usize {
        let target = target.clamp(1, self.ceiling);
        let current = self.size();
        if target > current {
            self.semaphore.add_permits(target - current);
            self.size.store(target, Ordering::SeqCst);
            target
        } else if target < current {
            let removed = self.semaphore.forget_permits(current - target);
            let reached = current - removed;
            self.size.store(reached, Ordering::SeqCst);
            reached
        } else {
            current
        }
    }
}

/// Everything the monitor task adjusts.
pub struct MonitorTargets {
    pub limiter: Arc<WorkerLimiter>,
    pub cache: Arc<ResultCache>,
    pub state: StateManager,
    pub metrics: Arc<ScanMetrics>,
}

/// Sample every [`SAMPLE_INTERVAL`] until cancelled or aborted.
pub fn spawn_monitor(
    mut monitor: ResourceMonitor,
    targets: MonitorTargets,
    mut cancel_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = super::cancelled(&mut cancel_rx) => break,
            }

            let mut sample = monitor.sample();
            sample.workers = targets.limiter.size();
            sample.busy_workers = targets.limiter.busy();
            tracing::debug!(
                "Resources: cpu {:.1}%, memory {:.1}%, process {} MiB, workers {}/{}",
                sample.cpu_percent,
                sample.memory_percent,
                sample.process_memory / (1024 * 1024),
                sample.busy_workers,
                sample.workers
            );

            let target = recommend_workers(&sample, sample.workers, targets.limiter.ceiling());
            if target != sample.workers {
                let reached = targets.limiter.resize(target);
                if reached != sample.workers {
                    tracing::info!("Worker count changed: {} -> {}", sample.workers, reached);
                    targets.metrics.record_worker_resize();
                    targets.state.set_workers(reached);
                }
            }

            if sample.under_pressure() {
                let keep = targets.cache.len() / 2;
                targets.cache.trim(keep);
            }
        }
    })
}
