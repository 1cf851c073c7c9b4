//! Anomaly scoring over a process profile
//!
//! The score is additive over a handful of behavioural signals and clamped to
//! [0, 100]. A profile is rogue when its score exceeds the configured
//! threshold.

use serde::Serialize;

use super::classifier::Classification;
use super::profile::ProcessProfile;

pub const SUSTAINED_CPU_MEAN: f64 = 95.0;
pub const SUSTAINED_CPU_POINTS: u32 = 30;

pub const ERRATIC_CPU_VARIANCE: f64 = 1000.0;
pub const ERRATIC_CPU_POINTS: u32 = 20;

pub const HIGH_MEMORY_MB: f64 = 4096.0;
pub const HIGH_MEMORY_POINTS: u32 = 25;

/// Per sampling window
pub const CONTEXT_SWITCH_STORM: u64 = 1000;
pub const CONTEXT_SWITCH_POINTS: u32 = 15;

pub const UNKNOWN_BUSY_MEAN: f64 = 50.0;
pub const UNKNOWN_BUSY_POINTS: u32 = 40;

pub const MAX_SCORE: u32 = 100;
pub const DEFAULT_THRESHOLD: u8 = 85;

/// Emitted when a profile newly turns rogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyAlert {
    pub pid: u32,
    pub name: String,
    pub classification: Classification,
    pub score: u8,
    pub cpu_mean: f64,
    pub memory_mb: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AnomalyAlert {
    pub fn from_profile(profile: &ProcessProfile) -> Self {
        Self {
            pid: profile.pid,
            name: profile.name.clone(),
            classification: profile.classification,
            score: profile.anomaly_score,
            cpu_mean: profile.cpu_history.mean(),
            memory_mb: profile.memory_mb,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyDetector {
    threshold: u8,
}

impl AnomalyDetector {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Score a profile from its current history and counters.
    pub fn score(&self, profile: &ProcessProfile) -> u8 {
        let mean = profile.cpu_history.mean();
        let variance = profile.cpu_history.variance();
        let mut score = 0u32;

        if mean > SUSTAINED_CPU_MEAN {
            score += SUSTAINED_CPU_POINTS;
        }
        if variance > ERRATIC_CPU_VARIANCE {
            score += ERRATIC_CPU_POINTS;
        }
        if profile.memory_mb > HIGH_MEMORY_MB {
            score += HIGH_MEMORY_POINTS;
        }
        if profile.context_switches > CONTEXT_SWITCH_STORM {
            score += CONTEXT_SWITCH_POINTS;
        }
        if profile.classification == Classification::Unknown && mean > UNKNOWN_BUSY_MEAN {
            score += UNKNOWN_BUSY_POINTS;
        }

        score.min(MAX_SCORE) as u8
    }

    pub fn is_rogue(&self, score: u8) -> bool {
        score > self.threshold
    }

    /// Re-derive score and rogue flag in place; returns the previous flag.
    pub fn evaluate(&self, profile: &mut ProcessProfile) -> bool {
        let was_rogue = profile.rogue;
        profile.anomaly_score = self.score(profile);
        profile.rogue = self.is_rogue(profile.anomaly_score);
        was_rogue
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
