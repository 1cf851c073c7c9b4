//! Real-time process monitoring loop
//!
//! Each tick samples every live process, folds the sample into its profile,
//! places new profiles on a compute unit, and evicts profiles that stopped
//! reporting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::anomaly::AnomalyAlert;
use crate::core::state::{Counters, SchedulerState, StateCell};
use crate::core::store::{ProfileStore, RogueTransition};
use crate::core::units::ComputeUnitStore;
use crate::platform::{ComputeUnitSource, HostProbe, ProcessSource};

/// Probes the monitor owns while it runs.
pub struct HostProbes {
    pub processes: Box<dyn ProcessSource>,
    pub units: Option<Box<dyn ComputeUnitSource>>,
}

impl HostProbes {
    pub fn new(processes: Box<dyn ProcessSource>) -> Self {
        Self { processes, units: None }
    }

    pub fn with_units(mut self, units: Box<dyn ComputeUnitSource>) -> Self {
        self.units = Some(units);
        self
    }

    /// sysinfo/procfs backed probes for this machine.
    pub fn host() -> Self {
        Self::new(Box::new(HostProbe::new())).with_units(Box::new(HostProbe::new()))
    }
}

/// What one monitor tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub observed: usize,
    pub created: usize,
    pub skipped: usize,
    pub evicted: usize,
    pub new_anomalies: usize,
}

#[derive(Clone)]
pub struct RealtimeMonitor {
    store: Arc<ProfileStore>,
    units: Arc<ComputeUnitStore>,
    state: Arc<StateCell>,
    counters: Arc<Counters>,
    alerts: broadcast::Sender<AnomalyAlert>,
    interval: Duration,
    ttl: Duration,
}

impl RealtimeMonitor {
    pub fn new(
        store: Arc<ProfileStore>,
        units: Arc<ComputeUnitStore>,
        state: Arc<StateCell>,
        counters: Arc<Counters>,
        alerts: broadcast::Sender<AnomalyAlert>,
        interval: Duration,
        ttl: Duration,
    ) -> Self {
        Self { store, units, state, counters, alerts, interval, ttl }
    }

    /// One full scan. Per-process failures are skipped, never fatal.
    pub fn run_tick(&self, probes: &mut HostProbes) -> TickSummary {
        let mut summary = TickSummary::default();

        if let Some(source) = probes.units.as_mut() {
            if let Some(percents) = source.utilization() {
                self.units.refresh_utilization(&percents);
            }
        }

        let entries = match probes.processes.enumerate() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Process enumeration failed: {}", e);
                Vec::new()
            }
        };

        for entry in &entries {
            let sample = match probes.processes.sample(entry) {
                Ok(sample) => sample,
                Err(e) => {
                    trace!("Skipping pid {}: {}", entry.pid, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let now = Instant::now();
            let Some(handle) = self.store.get_or_create(entry.pid, &entry.name, now) else {
                summary.skipped += 1;
                continue;
            };
            if handle.created {
                summary.created += 1;
                if let Some(unit) = self.units.recommend(&handle.profile) {
                    if !self.store.set_placement(entry.pid, unit) {
                        self.units.release(unit);
                    }
                }
            }

            let Some(outcome) = self.store.update(entry.pid, &sample, now) else {
                summary.skipped += 1;
                continue;
            };
            summary.observed += 1;

            match outcome.transition {
                RogueTransition::BecameRogue => {
                    let profile = &outcome.profile;
                    warn!(
                        "Rogue process: pid={} name={} class={} score={} cpu_mean={:.1}% mem={:.0}MB",
                        profile.pid,
                        profile.name,
                        profile.classification,
                        profile.anomaly_score,
                        profile.cpu_history.mean(),
                        profile.memory_mb
                    );
                    self.counters.record_anomaly();
                    summary.new_anomalies += 1;
                    // No subscribers is fine.
                    let _ = self.alerts.send(AnomalyAlert::from_profile(profile));
                }
                RogueTransition::Recovered => {
                    info!(
                        "Process recovered: pid={} name={} score={}",
                        outcome.profile.pid, outcome.profile.name, outcome.profile.anomaly_score
                    );
                }
                RogueTransition::Unchanged => {}
            }
        }

        let evicted = self.store.evict_stale(Instant::now(), self.ttl);
        for profile in &evicted {
            if let Some(unit) = profile.placement {
                self.units.release(unit);
            }
        }
        summary.evicted = evicted.len();

        self.state.set(SchedulerState::Predicting);
        debug!(
            "Monitor tick: observed={} created={} skipped={} evicted={} new_anomalies={}",
            summary.observed, summary.created, summary.skipped, summary.evicted, summary.new_anomalies
        );
        summary
    }

    /// Tick until `token` is cancelled. The scan runs on the blocking pool and
    /// always completes before cancellation is observed.
    pub async fn run(self, mut probes: HostProbes, token: CancellationToken) {
        info!("Monitor loop started (every {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let monitor = self.clone();
                    let scan = tokio::task::spawn_blocking(move || {
                        let summary = monitor.run_tick(&mut probes);
                        (probes, summary)
                    });
                    match scan.await {
                        Ok((returned, _)) => probes = returned,
                        Err(e) => {
                            warn!("Monitor tick aborted: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        info!("Monitor loop stopped");
    }
}
