//! Configuration for the scheduling advisor

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::classifier::ClassifierConfig;

/// Main scheduler configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Monitor loop tick (ms)
    pub prediction_window_ms: u64,

    /// Trainer loop tick (ms)
    pub model_update_interval_ms: u64,

    /// Anomaly score above which a profile is rogue (0-100)
    pub anomaly_threshold: u8,

    /// Scales the multiplicative weight nudge
    pub learning_rate: f32,

    /// Profiles unseen for longer than this are evicted (ms)
    pub profile_ttl_ms: u64,

    /// Training ticks before weights start moving
    pub warmup_samples: u64,

    /// Upper bound on tracked profiles
    pub max_profiles: usize,

    /// Max |predicted - observed| intensity for a prediction to count as accurate
    pub prediction_tolerance: f32,

    /// Seed for weight initialisation; entropy when absent
    pub model_seed: Option<u64>,

    /// Serve the JSON report over TCP
    pub report_enabled: bool,

    /// Where the JSON report is served
    pub report_endpoint: SocketAddr,

    /// Name-based workload rules
    pub classifier: ClassifierConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            prediction_window_ms: 1000,
            model_update_interval_ms: 5000,
            anomaly_threshold: 85,
            learning_rate: 0.05,
            profile_ttl_ms: 10_000,
            warmup_samples: 100,
            max_profiles: 4096,
            prediction_tolerance: 0.2,
            model_seed: None,
            report_enabled: true,
            report_endpoint: SocketAddr::from(([127, 0, 0, 1], 9477)),
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl SchedulerConfig {
    /// Environment variables that override file values.
    pub const ENV_OVERRIDES: [&'static str; 6] = [
        "PREDICTION_WINDOW",
        "MODEL_UPDATE_INTERVAL",
        "ANOMALY_THRESHOLD",
        "LEARNING_RATE",
        "PROFILE_TTL",
        "WARMUP_SAMPLES",
    ];

    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `<config_dir>/ruvector-sched/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("ruvector-sched").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Explicit path, else the default path if it exists, else defaults;
    /// then environment overrides and validation.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KEY=value` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{}={:?}", key, value)))
        }

        for key in Self::ENV_OVERRIDES {
            let Some(value) = lookup(key) else { continue };
            match key {
                "PREDICTION_WINDOW" => self.prediction_window_ms = parse(key, &value)?,
                "MODEL_UPDATE_INTERVAL" => self.model_update_interval_ms = parse(key, &value)?,
                "ANOMALY_THRESHOLD" => self.anomaly_threshold = parse(key, &value)?,
                "LEARNING_RATE" => self.learning_rate = parse(key, &value)?,
                "PROFILE_TTL" => self.profile_ttl_ms = parse(key, &value)?,
                "WARMUP_SAMPLES" => self.warmup_samples = parse(key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prediction_window_ms == 0 || self.model_update_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick intervals must be non-zero".into()));
        }
        if self.anomaly_threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "anomaly_threshold {} exceeds 100",
                self.anomaly_threshold
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "learning_rate {} outside (0, 1]",
                self.learning_rate
            )));
        }
        if self.profile_ttl_ms < self.prediction_window_ms {
            return Err(ConfigError::Invalid(format!(
                "profile_ttl_ms {} is shorter than prediction_window_ms {}",
                self.profile_ttl_ms, self.prediction_window_ms
            )));
        }
        if self.max_profiles == 0 {
            return Err(ConfigError::Invalid("max_profiles must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.prediction_tolerance) {
            return Err(ConfigError::Invalid(format!(
                "prediction_tolerance {} outside [0, 1]",
                self.prediction_tolerance
            )));
        }
        Ok(())
    }

    pub fn prediction_window(&self) -> Duration {
        Duration::from_millis(self.prediction_window_ms)
    }

    pub fn model_update_interval(&self) -> Duration {
        Duration::from_millis(self.model_update_interval_ms)
    }

    pub fn profile_ttl(&self) -> Duration {
        Duration::from_millis(self.profile_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.prediction_window(), Duration::from_millis(1000));
        assert_eq!(config.model_update_interval(), Duration::from_millis(5000));
        assert_eq!(config.anomaly_threshold, 85);
        assert_eq!(config.profile_ttl(), Duration::from_secs(10));
        assert_eq!(config.warmup_samples, 100);
        assert!((config.learning_rate - 0.05).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = SchedulerConfig {
            anomaly_threshold: 70,
            model_seed: Some(7),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = SchedulerConfig::load(&path).unwrap();
        assert_eq!(loaded.anomaly_threshold, 70);
        assert_eq!(loaded.model_seed, Some(7));
        assert_eq!(loaded.classifier, config.classifier);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "prediction_window_ms = 250\n").unwrap();

        let loaded = SchedulerConfig::load(&path).unwrap();
        assert_eq!(loaded.prediction_window_ms, 250);
        assert_eq!(loaded.model_update_interval_ms, 5000);
        assert!(!loaded.classifier.rules.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            [("ANOMALY_THRESHOLD", "60"), ("PROFILE_TTL", "2500")].into_iter().collect();
        let mut config = SchedulerConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.anomaly_threshold, 60);
        assert_eq!(config.profile_ttl_ms, 2500);
        assert_eq!(config.prediction_window_ms, 1000);
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = SchedulerConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "LEARNING_RATE").then(|| "fast".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation() {
        let config = SchedulerConfig { prediction_window_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = SchedulerConfig { anomaly_threshold: 101, ..Default::default() };
        assert!(config.validate().is_err());

        let config = SchedulerConfig { learning_rate: 0.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_must_cover_a_window() {
        let config = SchedulerConfig { profile_ttl_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = SchedulerConfig { profile_ttl_ms: 999, ..Default::default() };
        assert!(config.validate().is_err());

        let config = SchedulerConfig { profile_ttl_ms: 1000, ..Default::default() };
        assert!(config.validate().is_ok());

        let mut config = SchedulerConfig::default();
        config
            .apply_overrides(|k| (k == "PROFILE_TTL").then(|| "0".to_string()))
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_endpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = SchedulerConfig {
            report_enabled: false,
            report_endpoint: "127.0.0.1:9999".parse().unwrap(),
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = SchedulerConfig::load(&path).unwrap();
        assert!(!loaded.report_enabled);
        assert_eq!(loaded.report_endpoint, config.report_endpoint);

        std::fs::write(&path, "report_enabled = false\n").unwrap();
        let loaded = SchedulerConfig::load(&path).unwrap();
        assert!(!loaded.report_enabled);
        assert_eq!(loaded.report_endpoint, SchedulerConfig::default().report_endpoint);
    }
}
