//! Compute-unit store and advisory core selection
//!
//! Units are fixed at startup. Utilization and assignment counters live in
//! atomics so concurrent recommendations never lose an increment.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tracing::debug;

use super::classifier::Classification;
use super::profile::ProcessProfile;
use crate::platform::{PlatformError, PlatformResult, UnitCategory};

pub const COMPUTE_ON_PERFORMANCE_BONUS: f64 = 0.5;
pub const INTERACTIVE_ON_EFFICIENCY_BONUS: f64 = 0.3;
pub const PROTECTED_BONUS: f64 = 0.4;
pub const OCCUPIED_PENALTY: f64 = 0.1;

/// Point-in-time view of one compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComputeUnitProfile {
    pub id: usize,
    pub category: UnitCategory,
    pub utilization: f32,
    pub assigned: u32,
}

struct ComputeUnit {
    category: UnitCategory,
    /// f32 bits
    utilization: AtomicU32,
    assigned: AtomicU32,
}

pub struct ComputeUnitStore {
    units: Vec<ComputeUnit>,
}

impl ComputeUnitStore {
    /// Build from the startup enumeration. An empty host is an error.
    pub fn new(categories: Vec<UnitCategory>) -> PlatformResult<Self> {
        if categories.is_empty() {
            return Err(PlatformError::NotFound("no compute units".into()));
        }
        let units = categories
            .into_iter()
            .map(|category| ComputeUnit {
                category,
                utilization: AtomicU32::new(0f32.to_bits()),
                assigned: AtomicU32::new(0),
            })
            .collect();
        Ok(Self { units })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn set_utilization(&self, id: usize, percent: f32) {
        if let Some(unit) = self.units.get(id) {
            let clamped = percent.clamp(0.0, 100.0);
            unit.utilization.store(clamped.to_bits(), Ordering::Relaxed);
        }
    }

    /// Apply a per-unit utilization vector; extra entries are ignored.
    pub fn refresh_utilization(&self, percents: &[f32]) {
        for (id, &percent) in percents.iter().enumerate().take(self.units.len()) {
            self.set_utilization(id, percent);
        }
    }

    pub fn snapshot(&self) -> Vec<ComputeUnitProfile> {
        self.units
            .iter()
            .enumerate()
            .map(|(id, unit)| ComputeUnitProfile {
                id,
                category: unit.category,
                utilization: f32::from_bits(unit.utilization.load(Ordering::Relaxed)),
                assigned: unit.assigned.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Pick a unit for `profile` and count the assignment.
    pub fn recommend(&self, profile: &ProcessProfile) -> Option<usize> {
        let id = select_core(profile, &self.snapshot())?;
        self.units[id].assigned.fetch_add(1, Ordering::AcqRel);
        debug!("Recommended unit {} for pid {} ({})", id, profile.pid, profile.classification);
        Some(id)
    }

    /// Drop one assignment from `id`, never going below zero.
    pub fn release(&self, id: usize) {
        if let Some(unit) = self.units.get(id) {
            let _ = unit
                .assigned
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }
}

/// Suitability of `unit` for `profile`; higher is better.
pub fn score_unit(profile: &ProcessProfile, unit: &ComputeUnitProfile) -> f64 {
    let mut score = (100.0 - unit.utilization as f64) / 100.0;

    if profile.classification == Classification::ComputeIntensive
        && unit.category == UnitCategory::Performance
    {
        score += COMPUTE_ON_PERFORMANCE_BONUS;
    }
    if profile.classification == Classification::Interactive
        && unit.category == UnitCategory::Efficiency
    {
        score += INTERACTIVE_ON_EFFICIENCY_BONUS;
    }
    if profile.protected {
        score += PROTECTED_BONUS;
    }
    if unit.assigned >= 1 {
        score -= OCCUPIED_PENALTY;
    }
    score
}

/// Highest-scoring unit; ties keep the first unit encountered.
pub fn select_core(profile: &ProcessProfile, units: &[ComputeUnitProfile]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for unit in units {
        let score = score_unit(profile, unit);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((unit.id, score)),
        }
    }
    best.map(|(id, _)| id)
}
