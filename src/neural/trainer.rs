//! Trainer loop: feedback tracking and the periodic model update

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::model::{PredictionModel, SharedModel, TrainingParams, TrainingStep};
use crate::core::profile::ProcessProfile;
use crate::core::state::{Counters, SchedulerState, StateCell};
use crate::core::store::ProfileStore;

/// Outcome of comparing last tick's predictions with what was observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Feedback {
    pub compared: usize,
    pub accurate: usize,
}

impl Feedback {
    /// At least half accurate. Nothing compared is not correct.
    pub fn is_correct(&self) -> bool {
        self.compared > 0 && self.accurate * 2 >= self.compared
    }
}

/// Remembers the prediction made for each live pid so the next tick can
/// grade it against the CPU actually observed.
#[derive(Debug)]
pub struct FeedbackTracker {
    pending: HashMap<u32, f32>,
    tolerance: f32,
}

impl FeedbackTracker {
    pub fn new(tolerance: f32) -> Self {
        Self { pending: HashMap::new(), tolerance }
    }

    /// Grade outstanding predictions against `profiles`, then record fresh
    /// predictions from `model` for the next tick. Pids that vanished are
    /// dropped.
    pub fn evaluate(&mut self, profiles: &[ProcessProfile], model: &PredictionModel) -> Feedback {
        let mut feedback = Feedback::default();
        let mut next = HashMap::with_capacity(profiles.len());

        for profile in profiles {
            if let Some(&predicted) = self.pending.get(&profile.pid) {
                let observed = profile.latest_cpu() / 100.0;
                feedback.compared += 1;
                if (predicted - observed).abs() <= self.tolerance {
                    feedback.accurate += 1;
                }
            }
            next.insert(profile.pid, model.predict(profile));
        }

        self.pending = next;
        feedback
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

pub struct Trainer {
    store: Arc<ProfileStore>,
    model: Arc<SharedModel>,
    state: Arc<StateCell>,
    counters: Arc<Counters>,
    tracker: FeedbackTracker,
    params: TrainingParams,
    interval: Duration,
}

impl Trainer {
    pub fn new(
        store: Arc<ProfileStore>,
        model: Arc<SharedModel>,
        state: Arc<StateCell>,
        counters: Arc<Counters>,
        params: TrainingParams,
        tolerance: f32,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            model,
            state,
            counters,
            tracker: FeedbackTracker::new(tolerance),
            params,
            interval,
        }
    }

    /// One training tick. The profile table and the model are locked one
    /// after the other, never together.
    pub fn run_tick(&mut self) -> TrainingStep {
        self.state.set(SchedulerState::Optimizing);

        let profiles = self.store.snapshot();
        let model = self.model.snapshot();
        let feedback = self.tracker.evaluate(&profiles, &model);

        let step = self.model.train(feedback.is_correct(), &self.params);
        self.counters.record_prediction();
        debug!(
            "Feedback: {}/{} accurate across {} profiles",
            feedback.accurate,
            feedback.compared,
            profiles.len()
        );
        step
    }

    /// Tick until `token` is cancelled. A tick in progress always finishes.
    pub async fn run(mut self, token: CancellationToken) {
        info!("Trainer loop started (every {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; training waits one full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_tick();
                }
            }
        }
        info!("Trainer loop stopped");
    }
}
