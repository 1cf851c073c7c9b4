//! Model input features derived from a profile

use crate::core::classifier::Classification;
use crate::core::profile::ProcessProfile;

/// Width of the model input.
pub const INPUT_DIM: usize = 8;

/// Normalised model input, in this order: latest CPU fraction, memory GB,
/// IO ops (thousands), context switches (thousands), classification ordinal,
/// protected flag, anomaly score fraction, rogue flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f32; INPUT_DIM]);

impl FeatureVector {
    pub fn from_profile(profile: &ProcessProfile) -> Self {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        Self([
            profile.latest_cpu() / 100.0,
            (profile.memory_mb / 1024.0) as f32,
            profile.io_ops as f32 / 1000.0,
            profile.context_switches as f32 / 1000.0,
            profile.classification.ordinal() as f32 / (Classification::COUNT - 1) as f32,
            flag(profile.protected),
            profile.anomaly_score as f32 / 100.0,
            flag(profile.rogue),
        ])
    }

    pub fn as_array(&self) -> &[f32; INPUT_DIM] {
        &self.0
    }
}
