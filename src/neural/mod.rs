//! CPU-intensity prediction model and its trainer

pub mod features;
pub mod model;
pub mod trainer;

pub use features::{FeatureVector, INPUT_DIM};
pub use model::{ModelStats, PredictionModel, SharedModel, TrainingParams, TrainingStep};
pub use trainer::{Feedback, FeedbackTracker, Trainer};
