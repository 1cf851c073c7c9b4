//! Scheduler state and shared counters

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Learning,
    Predicting,
    Optimizing,
    /// Declared; no transition currently enters it.
    AnomalyDetection,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Learning => "Learning",
            SchedulerState::Predicting => "Predicting",
            SchedulerState::Optimizing => "Optimizing",
            SchedulerState::AnomalyDetection => "AnomalyDetection",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            SchedulerState::Learning => 0,
            SchedulerState::Predicting => 1,
            SchedulerState::Optimizing => 2,
            SchedulerState::AnomalyDetection => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SchedulerState::Predicting,
            2 => SchedulerState::Optimizing,
            3 => SchedulerState::AnomalyDetection,
            _ => SchedulerState::Learning,
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe holder for the current state, starting in `Learning`.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SchedulerState::Learning.to_u8()))
    }

    pub fn get(&self) -> SchedulerState {
        SchedulerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SchedulerState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic counters surfaced in the report.
#[derive(Debug, Default)]
pub struct Counters {
    total_predictions: AtomicU64,
    anomalies_detected: AtomicU64,
}

impl Counters {
    pub fn record_prediction(&self) {
        self.total_predictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anomaly(&self) {
        self.anomalies_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_predictions(&self) -> u64 {
        self.total_predictions.load(Ordering::Relaxed)
    }

    pub fn anomalies_detected(&self) -> u64 {
        self.anomalies_detected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_round_trip() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), SchedulerState::Learning);
        for state in [
            SchedulerState::Predicting,
            SchedulerState::Optimizing,
            SchedulerState::AnomalyDetection,
            SchedulerState::Learning,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_counters() {
        let counters = Counters::default();
        counters.record_prediction();
        counters.record_prediction();
        counters.record_anomaly();
        assert_eq!(counters.total_predictions(), 2);
        assert_eq!(counters.anomalies_detected(), 1);
    }
}
