//! Feed-forward CPU-intensity model (8 -> 4 -> 1)
//!
//! Inference is ReLU on the hidden layer and sigmoid on the output. Training
//! is a global multiplicative nudge of every weight driven by a single
//! correct/incorrect signal per tick.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use super::features::{FeatureVector, INPUT_DIM};
use crate::core::profile::ProcessProfile;

pub const HIDDEN_DIM: usize = 4;

/// Weights are initialised uniformly in [-INIT_RANGE, INIT_RANGE].
const INIT_RANGE: f32 = 0.5;

const CORRECT_NUDGE: f32 = 0.1;
const INCORRECT_NUDGE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelWeights {
    pub hidden: [[f32; INPUT_DIM]; HIDDEN_DIM],
    pub hidden_bias: [f32; HIDDEN_DIM],
    pub output: [f32; HIDDEN_DIM],
    pub output_bias: f32,
}

impl ModelWeights {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut draw = || rng.gen_range(-INIT_RANGE..=INIT_RANGE);
        let mut weights = Self {
            hidden: [[0.0; INPUT_DIM]; HIDDEN_DIM],
            hidden_bias: [0.0; HIDDEN_DIM],
            output: [0.0; HIDDEN_DIM],
            output_bias: 0.0,
        };
        for row in weights.hidden.iter_mut() {
            for w in row.iter_mut() {
                *w = draw();
            }
        }
        for b in weights.hidden_bias.iter_mut() {
            *b = draw();
        }
        for w in weights.output.iter_mut() {
            *w = draw();
        }
        weights.output_bias = draw();
        weights
    }

    pub fn forward(&self, input: &FeatureVector) -> f32 {
        let x = input.as_array();
        let mut z = self.output_bias;
        for (h, row) in self.hidden.iter().enumerate() {
            let pre: f32 = row.iter().zip(x.iter()).map(|(w, v)| w * v).sum::<f32>()
                + self.hidden_bias[h];
            z += self.output[h] * pre.max(0.0);
        }
        sigmoid(z)
    }

    /// Multiply every weight (biases excluded) by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for row in self.hidden.iter_mut() {
            for w in row.iter_mut() {
                *w *= factor;
            }
        }
        for w in self.output.iter_mut() {
            *w *= factor;
        }
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// Hyper-parameters of the training rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub learning_rate: f32,
    pub warmup_samples: u64,
}

/// What one training tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingStep {
    pub correct: bool,
    pub nudged: bool,
    pub factor: f32,
    pub training_samples: u64,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct PredictionModel {
    weights: ModelWeights,
    training_samples: u64,
    successful_predictions: u64,
    accuracy: f64,
    last_update: Option<DateTime<Utc>>,
}

impl PredictionModel {
    pub fn new(weights: ModelWeights) -> Self {
        Self {
            weights,
            training_samples: 0,
            successful_predictions: 0,
            accuracy: 0.0,
            last_update: None,
        }
    }

    /// Random weights, reproducible when `seed` is given.
    pub fn seeded(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(ModelWeights::random(&mut rng))
    }

    /// Predicted CPU intensity in [0, 1].
    pub fn predict(&self, profile: &ProcessProfile) -> f32 {
        self.weights.forward(&FeatureVector::from_profile(profile))
    }

    /// Apply one tick of the training rule.
    pub fn train(&mut self, correct: bool, params: &TrainingParams) -> TrainingStep {
        let nudged = self.training_samples > params.warmup_samples;
        let factor = if correct {
            1.0 + params.learning_rate * CORRECT_NUDGE
        } else {
            1.0 - params.learning_rate * INCORRECT_NUDGE
        };
        if nudged {
            self.weights.scale(factor);
        }

        self.training_samples += 1;
        if correct {
            self.successful_predictions += 1;
        }
        self.accuracy = self.successful_predictions as f64 / self.training_samples as f64;
        self.last_update = Some(Utc::now());

        TrainingStep {
            correct,
            nudged,
            factor: if nudged { factor } else { 1.0 },
            training_samples: self.training_samples,
            accuracy: self.accuracy,
        }
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    pub fn training_samples(&self) -> u64 {
        self.training_samples
    }

    pub fn successful_predictions(&self) -> u64 {
        self.successful_predictions
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            training_samples: self.training_samples,
            successful_predictions: self.successful_predictions,
            accuracy: self.accuracy,
            last_update: self.last_update,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelStats {
    pub training_samples: u64,
    pub successful_predictions: u64,
    pub accuracy: f64,
    pub last_update: Option<DateTime<Utc>>,
}

/// The single shared model. Writers go through `train`; readers take a copy.
pub struct SharedModel {
    inner: Mutex<PredictionModel>,
}

impl SharedModel {
    pub fn new(model: PredictionModel) -> Self {
        Self { inner: Mutex::new(model) }
    }

    pub fn snapshot(&self) -> PredictionModel {
        self.inner.lock().clone()
    }

    pub fn train(&self, correct: bool, params: &TrainingParams) -> TrainingStep {
        let step = self.inner.lock().train(correct, params);
        debug!(
            "Training tick: correct={} nudged={} samples={} accuracy={:.3}",
            step.correct, step.nudged, step.training_samples, step.accuracy
        );
        step
    }

    pub fn stats(&self) -> ModelStats {
        self.inner.lock().stats()
    }
}
