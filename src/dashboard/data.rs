//! Report data structures
//!
//! Field order is the wire order of the JSON report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::anomaly::AnomalyAlert;
use crate::core::classifier::Classification;
use crate::core::profile::ProcessProfile;
use crate::core::state::SchedulerState;
use crate::core::units::ComputeUnitProfile;
use crate::neural::PredictionModel;
use crate::platform::UnitCategory;

/// One tracked process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub pid: u32,
    pub classification: Classification,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub anomaly_score: u8,
    pub rogue: bool,
    pub protected: bool,
    pub name: String,
    pub predicted_intensity: f32,
    pub placement: Option<usize>,
}

/// One compute unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRow {
    pub id: usize,
    pub category: UnitCategory,
    pub utilization: f32,
    pub assigned: u32,
}

impl From<&ComputeUnitProfile> for UnitRow {
    fn from(unit: &ComputeUnitProfile) -> Self {
        Self {
            id: unit.id,
            category: unit.category,
            utilization: unit.utilization,
            assigned: unit.assigned,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub profiles: usize,
    pub protected: usize,
    pub rogue: usize,
}

/// Point-in-time view of the whole advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub state: String,
    pub active: bool,
    pub total_predictions: u64,
    pub successful_predictions: u64,
    pub model_accuracy: String,
    pub anomalies_detected: u64,
    pub profiles: Vec<ProfileRow>,
    pub totals: ReportTotals,
    pub compute_units: Vec<UnitRow>,
    pub generated_at: DateTime<Utc>,
}

/// Copies the report is assembled from. Nothing here is locked.
pub struct ReportInputs<'a> {
    pub state: SchedulerState,
    pub active: bool,
    pub total_predictions: u64,
    pub anomalies_detected: u64,
    pub model: &'a PredictionModel,
    pub profiles: &'a [ProcessProfile],
    pub units: &'a [ComputeUnitProfile],
}

impl SchedulerReport {
    pub fn build(inputs: ReportInputs<'_>) -> Self {
        let profiles: Vec<ProfileRow> = inputs
            .profiles
            .iter()
            .map(|p| ProfileRow {
                pid: p.pid,
                classification: p.classification,
                cpu_percent: p.latest_cpu(),
                memory_mb: p.memory_mb,
                anomaly_score: p.anomaly_score,
                rogue: p.rogue,
                protected: p.protected,
                name: p.name.clone(),
                predicted_intensity: inputs.model.predict(p),
                placement: p.placement,
            })
            .collect();

        let totals = ReportTotals {
            profiles: profiles.len(),
            protected: profiles.iter().filter(|r| r.protected).count(),
            rogue: profiles.iter().filter(|r| r.rogue).count(),
        };

        Self {
            state: inputs.state.as_str().to_string(),
            active: inputs.active,
            total_predictions: inputs.total_predictions,
            successful_predictions: inputs.model.successful_predictions(),
            model_accuracy: format_accuracy(inputs.model.accuracy()),
            anomalies_detected: inputs.anomalies_detected,
            profiles,
            totals,
            compute_units: inputs.units.iter().map(UnitRow::from).collect(),
            generated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for SchedulerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::monitor::dashboard::render_report(self))
    }
}

/// `0.4567` -> `"45.67%"`
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.2}%", accuracy * 100.0)
}

/// Messages pushed to report clients, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Report(SchedulerReport),
    Alert(AnomalyAlert),
    Error { message: String },
}
