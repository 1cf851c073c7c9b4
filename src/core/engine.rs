//! Scheduler core: owns the shared stores and the background workers

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::anomaly::{AnomalyAlert, AnomalyDetector};
use super::classifier::Classifier;
use super::config::{ConfigError, SchedulerConfig};
use super::state::{Counters, SchedulerState, StateCell};
use super::store::ProfileStore;
use super::units::ComputeUnitStore;
use crate::dashboard::data::ReportInputs;
use crate::dashboard::{ReportProvider, ReportServer, SchedulerReport};
use crate::monitor::{HostProbes, RealtimeMonitor, TickSummary};
use crate::neural::{PredictionModel, SharedModel, Trainer, TrainingParams};
use crate::platform::{ComputeUnitSource, PlatformError};

const ALERT_CAPACITY: usize = 64;

/// Fatal startup failures.
#[derive(Debug)]
pub enum InitError {
    Config(ConfigError),
    NoComputeUnits(PlatformError),
    Bind { addr: SocketAddr, source: std::io::Error },
    AlreadyStarted,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Config(e) => write!(f, "Invalid configuration: {}", e),
            InitError::NoComputeUnits(e) => write!(f, "No compute units: {}", e),
            InitError::Bind { addr, source } => {
                write!(f, "Cannot bind report endpoint {}: {}", addr, source)
            }
            InitError::AlreadyStarted => write!(f, "Scheduler was already started"),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Config(e) => Some(e),
            InitError::NoComputeUnits(e) => Some(e),
            InitError::Bind { source, .. } => Some(source),
            InitError::AlreadyStarted => None,
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(err: ConfigError) -> Self {
        InitError::Config(err)
    }
}

/// State shared by the workers and report readers.
struct Shared {
    store: Arc<ProfileStore>,
    units: Arc<ComputeUnitStore>,
    model: Arc<SharedModel>,
    state: Arc<StateCell>,
    counters: Arc<Counters>,
    active: AtomicBool,
}

impl ReportProvider for Shared {
    fn report(&self) -> SchedulerReport {
        // Each copy takes and releases its own lock.
        let profiles = self.store.snapshot();
        let model = self.model.snapshot();
        let units = self.units.snapshot();

        SchedulerReport::build(ReportInputs {
            state: self.state.get(),
            active: self.active.load(Ordering::Acquire),
            total_predictions: self.counters.total_predictions(),
            anomalies_detected: self.counters.anomalies_detected(),
            model: &model,
            profiles: &profiles,
            units: &units,
        })
    }
}

pub struct SchedulerCore {
    config: SchedulerConfig,
    shared: Arc<Shared>,
    alerts: broadcast::Sender<AnomalyAlert>,
    token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SchedulerCore {
    /// Validate `config` and enumerate compute units. Nothing runs yet.
    pub fn new(
        config: SchedulerConfig,
        units_source: &mut dyn ComputeUnitSource,
    ) -> Result<Self, InitError> {
        config.validate()?;

        let categories = units_source.enumerate_units().map_err(InitError::NoComputeUnits)?;
        let units = ComputeUnitStore::new(categories).map_err(InitError::NoComputeUnits)?;

        let classifier = Arc::new(Classifier::new(config.classifier.clone()));
        let store = ProfileStore::new(
            classifier,
            AnomalyDetector::new(config.anomaly_threshold),
            config.max_profiles,
        );
        let model = PredictionModel::seeded(config.model_seed);
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);

        info!(
            "Scheduler initialised: {} compute units, threshold {}, warm-up {} samples",
            units.len(),
            config.anomaly_threshold,
            config.warmup_samples
        );

        Ok(Self {
            shared: Arc::new(Shared {
                store: Arc::new(store),
                units: Arc::new(units),
                model: Arc::new(SharedModel::new(model)),
                state: Arc::new(StateCell::new()),
                counters: Arc::new(Counters::default()),
                active: AtomicBool::new(false),
            }),
            config,
            alerts,
            token: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the monitor and trainer loops, plus the report endpoint when
    /// configured. A core runs at most once.
    pub async fn start(&self, probes: HostProbes) -> Result<(), InitError> {
        if self.token.is_cancelled() || self.shared.active.swap(true, Ordering::AcqRel) {
            return Err(InitError::AlreadyStarted);
        }

        let server = if self.config.report_enabled {
            let addr = self.config.report_endpoint;
            match ReportServer::bind(addr).await {
                Ok(server) => Some(server),
                Err(source) => {
                    self.shared.active.store(false, Ordering::Release);
                    return Err(InitError::Bind { addr, source });
                }
            }
        } else {
            None
        };

        let mut workers = self.workers.lock();
        workers.push(tokio::spawn(self.monitor().run(probes, self.token.clone())));
        workers.push(tokio::spawn(self.trainer().run(self.token.clone())));
        if let Some(server) = server {
            let provider: Arc<dyn ReportProvider> = self.shared.clone();
            workers.push(tokio::spawn(server.serve(
                provider,
                self.alerts.clone(),
                self.token.clone(),
            )));
        }

        info!("Scheduler started ({} workers)", workers.len());
        Ok(())
    }

    /// Cancel every worker and wait for them. Always succeeds.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Worker ended abnormally: {}", e);
            }
        }
        self.shared.active.store(false, Ordering::Release);
        info!("Scheduler stopped");
    }

    /// A monitor bound to this core's stores.
    pub fn monitor(&self) -> RealtimeMonitor {
        RealtimeMonitor::new(
            Arc::clone(&self.shared.store),
            Arc::clone(&self.shared.units),
            Arc::clone(&self.shared.state),
            Arc::clone(&self.shared.counters),
            self.alerts.clone(),
            self.config.prediction_window(),
            self.config.profile_ttl(),
        )
    }

    /// A trainer bound to this core's model.
    pub fn trainer(&self) -> Trainer {
        Trainer::new(
            Arc::clone(&self.shared.store),
            Arc::clone(&self.shared.model),
            Arc::clone(&self.shared.state),
            Arc::clone(&self.shared.counters),
            TrainingParams {
                learning_rate: self.config.learning_rate,
                warmup_samples: self.config.warmup_samples,
            },
            self.config.prediction_tolerance,
            self.config.model_update_interval(),
        )
    }

    /// Run a single monitor pass on the calling thread.
    pub fn scan_once(&self, probes: &mut HostProbes) -> TickSummary {
        self.monitor().run_tick(probes)
    }

    pub fn report(&self) -> SchedulerReport {
        self.shared.report()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AnomalyAlert> {
        self.alerts.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state.get()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::realtime::tests::SyntheticSource;
    use crate::platform::{PlatformResult, UnitCategory};
    use std::collections::HashSet;
    use std::time::Duration;

    struct Units(Vec<UnitCategory>);

    impl ComputeUnitSource for Units {
        fn enumerate_units(&mut self) -> PlatformResult<Vec<UnitCategory>> {
            Ok(self.0.clone())
        }
    }

    fn two_units() -> Units {
        Units(vec![UnitCategory::Performance, UnitCategory::Efficiency])
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            prediction_window_ms: 10,
            model_update_interval_ms: 20,
            model_seed: Some(7),
            report_enabled: false,
            ..SchedulerConfig::default()
        }
    }

    fn probes() -> HostProbes {
        HostProbes::new(Box::new(SyntheticSource::with(&[
            (4242, "metasploit_gui", 12.0, 300.0),
            (5000, "ffmpeg", 85.0, 900.0),
            (8000, "xmrig", 98.0, 5000.0),
        ])))
    }

    #[test]
    fn test_no_units_is_fatal() {
        let err = SchedulerCore::new(fast_config(), &mut Units(vec![])).err().unwrap();
        assert!(matches!(err, InitError::NoComputeUnits(_)));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = SchedulerConfig { prediction_window_ms: 0, ..fast_config() };
        let err = SchedulerCore::new(config, &mut two_units()).err().unwrap();
        assert!(matches!(err, InitError::Config(_)));
    }

    #[test]
    fn test_fresh_core_reports_learning() {
        let core = SchedulerCore::new(fast_config(), &mut two_units()).unwrap();
        let report = core.report();
        assert_eq!(report.state, "Learning");
        assert!(!report.active);
        assert_eq!(report.model_accuracy, "0.00%");
        assert_eq!(report.compute_units.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_and_shutdown() {
        let core = SchedulerCore::new(fast_config(), &mut two_units()).unwrap();
        let mut alerts = core.subscribe_alerts();

        core.start(probes()).await.unwrap();
        assert!(core.is_active());
        assert!(matches!(core.start(probes()).await, Err(InitError::AlreadyStarted)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let report = core.report();
        assert!(report.active);
        assert_eq!(report.totals.profiles, 3);
        assert_eq!(report.totals.rogue, 1);
        assert_eq!(report.anomalies_detected, 1);
        assert!(report.total_predictions > 0);
        assert!(report.state == "Predicting" || report.state == "Optimizing");

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.pid, 8000);

        core.shutdown().await;
        assert!(!core.is_active());
        assert!(!core.report().active);
        assert!(matches!(core.start(probes()).await, Err(InitError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_endpoint_bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = SchedulerConfig {
            report_enabled: true,
            report_endpoint: taken.local_addr().unwrap(),
            ..fast_config()
        };
        let core = SchedulerCore::new(config, &mut two_units()).unwrap();
        let err = core.start(probes()).await.err().unwrap();
        assert!(matches!(err, InitError::Bind { .. }));
        assert!(!core.is_active());
        core.shutdown().await;
    }

    #[test]
    fn test_concurrent_monitor_trainer_and_reports() {
        let core = Arc::new(SchedulerCore::new(fast_config(), &mut two_units()).unwrap());
        let rows: Vec<(u32, String)> =
            (2000..2300u32).map(|pid| (pid, format!("worker-{}", pid))).collect();

        let mut threads = Vec::new();
        for t in 0..3usize {
            let core = Arc::clone(&core);
            let mut rows = rows.clone();
            rows.rotate_left(t * 100);
            threads.push(std::thread::spawn(move || {
                let table: Vec<(u32, &str, f32, f64)> =
                    rows.iter().map(|(pid, n)| (*pid, n.as_str(), 40.0, 128.0)).collect();
                let mut probes = HostProbes::new(Box::new(SyntheticSource::with(&table)));
                for _ in 0..10 {
                    core.scan_once(&mut probes);
                }
            }));
        }
        {
            let core = Arc::clone(&core);
            threads.push(std::thread::spawn(move || {
                let mut trainer = core.trainer();
                for _ in 0..50 {
                    trainer.run_tick();
                }
            }));
        }
        {
            let core = Arc::clone(&core);
            threads.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let report = core.report();
                    assert!(report.totals.profiles <= 300);
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }

        let report = core.report();
        let pids: HashSet<u32> = report.profiles.iter().map(|r| r.pid).collect();
        assert_eq!(report.profiles.len(), rows.len());
        assert_eq!(pids.len(), rows.len());
        // Each profile was sampled 10 times by each of the three scanners.
        for profile in core.shared.store.snapshot() {
            assert_eq!(profile.samples, 30, "pid {} lost updates", profile.pid);
            assert_eq!(profile.cpu_history.len(), 10);
        }
        let assigned: u32 = report.compute_units.iter().map(|u| u.assigned).sum();
        assert_eq!(assigned as usize, rows.len());
        assert_eq!(report.total_predictions, 50);
    }
}
