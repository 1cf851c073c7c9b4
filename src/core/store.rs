//! Profile store: the per-process table behind one exclusive lock
//!
//! Every operation takes the table lock for a short, bounded critical
//! section. Classification runs before the lock is taken.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::anomaly::AnomalyDetector;
use super::classifier::Classifier;
use super::profile::ProcessProfile;
use crate::platform::RawSample;

/// Result of `get_or_create`.
#[derive(Debug, Clone)]
pub struct ProfileHandle {
    pub profile: ProcessProfile,
    pub created: bool,
}

/// Rogue-flag movement caused by one `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RogueTransition {
    Unchanged,
    BecameRogue,
    Recovered,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub transition: RogueTransition,
    /// Profile state after the update
    pub profile: ProcessProfile,
}

pub struct ProfileStore {
    table: Mutex<HashMap<u32, ProcessProfile>>,
    classifier: Arc<Classifier>,
    detector: AnomalyDetector,
    capacity: usize,
}

impl ProfileStore {
    pub fn new(classifier: Arc<Classifier>, detector: AnomalyDetector, capacity: usize) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            classifier,
            detector,
            capacity,
        }
    }

    /// Return the profile for `pid`, creating a classified, zeroed one if
    /// absent. `None` when the table is full; creation is retried next cycle.
    pub fn get_or_create(&self, pid: u32, name: &str, now: Instant) -> Option<ProfileHandle> {
        if let Some(existing) = self.table.lock().get(&pid) {
            return Some(ProfileHandle { profile: existing.clone(), created: false });
        }

        let classification = self.classifier.classify(name, pid);

        let mut table = self.table.lock();
        if let Some(existing) = table.get(&pid) {
            return Some(ProfileHandle { profile: existing.clone(), created: false });
        }
        if table.len() >= self.capacity {
            trace!("Profile table full ({}), deferring pid {}", self.capacity, pid);
            return None;
        }
        let profile = ProcessProfile::new(pid, name, classification, now);
        table.insert(pid, profile.clone());
        Some(ProfileHandle { profile, created: true })
    }

    /// Fold a fresh sample into the profile and re-score it.
    /// `None` if the pid has no profile.
    pub fn update(&self, pid: u32, sample: &RawSample, now: Instant) -> Option<UpdateOutcome> {
        let mut table = self.table.lock();
        let profile = table.get_mut(&pid)?;

        profile.cpu_history.push(sample.cpu_percent);
        profile.samples += 1;
        profile.memory_mb = sample.memory_mb;
        profile.runtime = sample.runtime;
        profile.io_ops = window_delta(&mut profile.last_io_total, sample.io_ops_total);
        profile.context_switches =
            window_delta(&mut profile.last_switch_total, sample.context_switches_total);
        profile.last_seen = now;

        let was_rogue = self.detector.evaluate(profile);
        let transition = match (was_rogue, profile.rogue) {
            (false, true) => RogueTransition::BecameRogue,
            (true, false) => RogueTransition::Recovered,
            _ => RogueTransition::Unchanged,
        };
        Some(UpdateOutcome { transition, profile: profile.clone() })
    }

    /// Record the advisory placement chosen for a profile.
    pub fn set_placement(&self, pid: u32, unit: usize) -> bool {
        match self.table.lock().get_mut(&pid) {
            Some(profile) => {
                profile.placement = Some(unit);
                true
            }
            None => false,
        }
    }

    /// Remove every profile unseen for longer than `ttl`; returns them.
    pub fn evict_stale(&self, now: Instant, ttl: Duration) -> Vec<ProcessProfile> {
        let Some(cutoff) = now.checked_sub(ttl) else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        self.table.lock().retain(|_, profile| {
            if profile.last_seen < cutoff {
                evicted.push(profile.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Copy of every profile, ordered by pid.
    pub fn snapshot(&self) -> Vec<ProcessProfile> {
        let mut profiles: Vec<ProcessProfile> = self.table.lock().values().cloned().collect();
        profiles.sort_by_key(|p| p.pid);
        profiles
    }

    pub fn get(&self, pid: u32) -> Option<ProcessProfile> {
        self.table.lock().get(&pid).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

/// Per-window delta of a cumulative counter; 0 on first observation or
/// counter reset.
fn window_delta(last: &mut Option<u64>, total: u64) -> u64 {
    let delta = match *last {
        Some(prev) => total.saturating_sub(prev),
        None => 0,
    };
    *last = Some(total);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Classification;
    use crate::core::profile::CPU_HISTORY_LEN;

    fn store() -> ProfileStore {
        ProfileStore::new(Arc::new(Classifier::default()), AnomalyDetector::default(), 64)
    }

    fn sample(cpu: f32, memory_mb: f64) -> RawSample {
        RawSample { cpu_percent: cpu, memory_mb, ..Default::default() }
    }

    #[test]
    fn test_get_or_create_once() {
        let store = store();
        let now = Instant::now();
        let first = store.get_or_create(4242, "metasploit_gui", now).unwrap();
        assert!(first.created);
        assert_eq!(first.profile.classification, Classification::SecurityTool);

        let second = store.get_or_create(4242, "renamed", now).unwrap();
        assert!(!second.created);
        assert_eq!(second.profile.name, "metasploit_gui");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_capacity_refuses_creation() {
        let store = ProfileStore::new(Arc::new(Classifier::default()), AnomalyDetector::default(), 2);
        let now = Instant::now();
        assert!(store.get_or_create(1000, "a", now).is_some());
        assert!(store.get_or_create(1001, "b", now).is_some());
        assert!(store.get_or_create(1002, "c", now).is_none());
        // Existing profiles stay reachable
        assert!(store.get_or_create(1000, "a", now).is_some());
    }

    #[test]
    fn test_update_missing_pid() {
        let store = store();
        assert!(store.update(9, &sample(1.0, 1.0), Instant::now()).is_none());
    }

    #[test]
    fn test_ring_after_many_updates() {
        let store = store();
        let now = Instant::now();
        store.get_or_create(5000, "worker", now).unwrap();
        for i in 0..(CPU_HISTORY_LEN + 7) {
            store.update(5000, &sample(i as f32, 10.0), now).unwrap();
        }
        let profile = store.get(5000).unwrap();
        assert_eq!(profile.cpu_history.len(), CPU_HISTORY_LEN);
        assert_eq!(profile.cpu_history.latest(), Some((CPU_HISTORY_LEN + 6) as f32));
        assert_eq!(profile.samples, (CPU_HISTORY_LEN + 7) as u64);
    }

    #[test]
    fn test_score_stays_clamped() {
        let store = store();
        let now = Instant::now();
        store.get_or_create(6000, "xmrig", now).unwrap();
        let inputs = [
            (100.0, 9000.0, 0u64),
            (0.0, 1.0, 10_000),
            (100.0, 9000.0, 50_000),
            (100.0, 9000.0, 500_000),
        ];
        for (cpu, mem, switches) in inputs {
            let raw = RawSample {
                cpu_percent: cpu,
                memory_mb: mem,
                context_switches_total: switches,
                ..Default::default()
            };
            let outcome = store.update(6000, &raw, now).unwrap();
            assert!(outcome.profile.anomaly_score <= 100);
        }
    }

    #[test]
    fn test_counter_deltas() {
        let store = store();
        let now = Instant::now();
        store.get_or_create(7000, "rsync", now).unwrap();

        let mut raw = RawSample { io_ops_total: 500, context_switches_total: 10_000, ..Default::default() };
        let first = store.update(7000, &raw, now).unwrap();
        assert_eq!(first.profile.io_ops, 0);
        assert_eq!(first.profile.context_switches, 0);

        raw.io_ops_total = 800;
        raw.context_switches_total = 12_500;
        let second = store.update(7000, &raw, now).unwrap();
        assert_eq!(second.profile.io_ops, 300);
        assert_eq!(second.profile.context_switches, 2_500);
    }

    #[test]
    fn test_rogue_transitions() {
        let store = store();
        let now = Instant::now();
        store.get_or_create(8000, "xmrig", now).unwrap();

        let hog = sample(98.0, 5000.0);
        let mut transitions = Vec::new();
        for _ in 0..3 {
            transitions.push(store.update(8000, &hog, now).unwrap().transition);
        }
        assert_eq!(
            transitions,
            vec![
                RogueTransition::BecameRogue,
                RogueTransition::Unchanged,
                RogueTransition::Unchanged
            ]
        );

        let mut last = RogueTransition::Unchanged;
        for _ in 0..CPU_HISTORY_LEN {
            let outcome = store.update(8000, &sample(1.0, 10.0), now).unwrap();
            if outcome.transition != RogueTransition::Unchanged {
                last = outcome.transition;
            }
        }
        assert_eq!(last, RogueTransition::Recovered);
    }

    #[test]
    fn test_eviction_respects_ttl() {
        let store = store();
        let start = Instant::now();
        let ttl = Duration::from_secs(10);

        store.get_or_create(100_001, "stale", start).unwrap();
        store.get_or_create(100_002, "fresh", start).unwrap();
        store.update(100_002, &sample(1.0, 1.0), start + Duration::from_secs(8)).unwrap();

        let now = start + Duration::from_secs(11);
        let before: Vec<u32> = store.snapshot().iter().map(|p| p.pid).collect();
        assert!(before.contains(&100_001));

        let evicted = store.evict_stale(now, ttl);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].pid, 100_001);

        let after: Vec<u32> = store.snapshot().iter().map(|p| p.pid).collect();
        assert_eq!(after, vec![100_002]);
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = store();
        let now = Instant::now();
        for pid in [3000, 1000, 2000] {
            store.get_or_create(pid, "x", now).unwrap();
        }
        let pids: Vec<u32> = store.snapshot().iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_set_placement() {
        let store = store();
        store.get_or_create(4000, "x", Instant::now()).unwrap();
        assert!(store.set_placement(4000, 3));
        assert_eq!(store.get(4000).unwrap().placement, Some(3));
        assert!(!store.set_placement(4001, 3));
    }
}
