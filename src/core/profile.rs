//! Per-process behavioural profile

use std::time::{Duration, Instant};

use super::classifier::Classification;

/// Number of CPU samples kept per profile.
pub const CPU_HISTORY_LEN: usize = 10;

/// Fixed-capacity ring of CPU% samples, most recent at index 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuHistory {
    samples: [f32; CPU_HISTORY_LEN],
    len: usize,
}

impl CpuHistory {
    pub const fn new() -> Self {
        Self { samples: [0.0; CPU_HISTORY_LEN], len: 0 }
    }

    /// Insert the newest sample at the front, dropping the oldest when full.
    pub fn push(&mut self, cpu_percent: f32) {
        self.samples.copy_within(0..CPU_HISTORY_LEN - 1, 1);
        self.samples[0] = cpu_percent;
        self.len = (self.len + 1).min(CPU_HISTORY_LEN);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn latest(&self) -> Option<f32> {
        (self.len > 0).then(|| self.samples[0])
    }

    /// Filled samples, newest first.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples[..self.len]
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.as_slice().iter().map(|&s| s as f64).sum::<f64>() / self.len as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        self.as_slice()
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / self.len as f64
    }
}

impl Default for CpuHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Behavioural record for one process.
#[derive(Debug, Clone)]
pub struct ProcessProfile {
    pub pid: u32,
    pub name: String,
    pub classification: Classification,
    pub last_seen: Instant,
    pub runtime: Duration,
    pub cpu_history: CpuHistory,
    /// Samples folded in since creation
    pub samples: u64,
    pub memory_mb: f64,
    /// IO operations during the last sampling window
    pub io_ops: u64,
    /// Context switches during the last sampling window
    pub context_switches: u64,
    /// Always within [0, 100]
    pub anomaly_score: u8,
    pub rogue: bool,
    pub protected: bool,
    /// Advisory compute unit chosen at creation
    pub placement: Option<usize>,
    /// Cumulative host counters at the previous sample
    pub(crate) last_io_total: Option<u64>,
    pub(crate) last_switch_total: Option<u64>,
}

impl ProcessProfile {
    /// Zeroed profile; the protected flag follows from the classification.
    pub fn new(pid: u32, name: impl Into<String>, classification: Classification, now: Instant) -> Self {
        Self {
            pid,
            name: name.into(),
            classification,
            last_seen: now,
            runtime: Duration::ZERO,
            cpu_history: CpuHistory::new(),
            samples: 0,
            memory_mb: 0.0,
            io_ops: 0,
            context_switches: 0,
            anomaly_score: 0,
            rogue: false,
            protected: classification.is_protected(),
            placement: None,
            last_io_total: None,
            last_switch_total: None,
        }
    }

    pub fn latest_cpu(&self) -> f32 {
        self.cpu_history.latest().unwrap_or(0.0)
    }
}
