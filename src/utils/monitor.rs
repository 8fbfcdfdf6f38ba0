use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Resource usage observed at the end of one pipeline phase.
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub elapsed: Duration,
}

/// Samples the current process after each pipeline phase.
///
/// A disabled monitor only keeps wall-clock timings.
pub struct SystemMonitor {
    #[cfg(feature = "cli")]
    system: Mutex<System>,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    start_time: Instant,
    phases: Mutex<Vec<PhaseStats>>,
    enabled: bool,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            #[cfg(feature = "cli")]
            system: Mutex::new(System::new()),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
            start_time: Instant::now(),
            phases: Mutex::new(Vec::new()),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn sample(&self) -> (f32, u64) {
        let (Some(pid), Ok(mut system)) = (self.pid, self.system.lock()) else {
            return (0.0, 0);
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        system
            .process(pid)
            .map(|p| (p.cpu_usage(), p.memory() / 1024 / 1024))
            .unwrap_or((0.0, 0))
    }

    #[cfg(not(feature = "cli"))]
    fn sample(&self) -> (f32, u64) {
        (0.0, 0)
    }

    /// Records the end of `phase` and logs it when monitoring is enabled.
    pub fn record_phase(&self, phase: &str) {
        let (cpu_usage, memory_mb) = if self.enabled {
            self.sample()
        } else {
            (0.0, 0)
        };
        let stats = PhaseStats {
            phase: phase.to_string(),
            cpu_usage,
            memory_mb,
            elapsed: self.start_time.elapsed(),
        };

        if self.enabled {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Time: {:?}",
                stats.phase,
                stats.cpu_usage,
                stats.memory_mb,
                stats.elapsed
            );
        }

        if let Ok(mut phases) = self.phases.lock() {
            phases.push(stats);
        }
    }

    pub fn phases(&self) -> Vec<PhaseStats> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn peak_memory_mb(&self) -> u64 {
        self.phases().iter().map(|p| p.memory_mb).max().unwrap_or(0)
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.start_time.elapsed(),
            self.peak_memory_mb()
        );
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
