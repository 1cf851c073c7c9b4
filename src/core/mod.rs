//! Core scheduling logic

pub mod anomaly;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod profile;
pub mod state;
pub mod store;
pub mod units;
