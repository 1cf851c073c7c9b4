//! RuVector Scheduler
//!
//! A privileged monitoring daemon that profiles every running process,
//! classifies it by workload, scores it for anomalous behaviour, predicts
//! its CPU intensity with a small feed-forward model, and recommends a
//! compute unit for it.
//!
//! ## Features
//!
//! - **Profiling**: bounded per-process history refreshed every window
//! - **Classification**: data-driven name rules with a low-pid system fallback
//! - **Anomaly Detection**: additive 0-100 score, edge-triggered alerts
//! - **Prediction**: 8-4-1 network with a warm-up gated training nudge
//! - **Advisory Placement**: utilisation and workload aware core scoring
//! - **Reporting**: text, JSON, and a TCP endpoint with pushed alerts
//!
//! ## Safety
//!
//! - Placement is advisory only; nothing is pinned or migrated
//! - The profile table and the model are never locked together
//! - Per-process probe failures are skipped, never fatal

pub mod core;
pub mod dashboard;
pub mod monitor;
pub mod neural;
pub mod platform;

// Re-exports
pub use crate::core::anomaly::{AnomalyAlert, AnomalyDetector};
pub use crate::core::classifier::{Classification, Classifier, ClassifierConfig};
pub use crate::core::config::{ConfigError, SchedulerConfig};
pub use crate::core::engine::{InitError, SchedulerCore};
pub use crate::core::state::SchedulerState;
pub use dashboard::{ReportServer, SchedulerReport};
pub use monitor::{HostProbes, RealtimeMonitor, TickSummary};
pub use neural::{PredictionModel, Trainer};
pub use platform::{
    ComputeUnitSource, HostProbe, PlatformError, PlatformResult, ProcessEntry, ProcessSource,
    RawSample, UnitCategory,
};
