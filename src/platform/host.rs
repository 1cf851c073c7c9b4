//! Host observation backed by sysinfo, with /proc and sysfs detail on Linux
//!
//! sysinfo provides process enumeration, CPU%, RSS and per-core utilization.
//! On Linux, context-switch counts come from `/proc/[pid]/status`, syscall IO
//! counts from `/proc/[pid]/io`, and hybrid core topology from sysfs.

use std::time::Duration;

use sysinfo::{Pid, System};
use tracing::debug;

use super::traits::{
    ComputeUnitSource, PlatformError, PlatformResult, ProcessEntry, ProcessSource, RawSample,
    UnitCategory,
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Live host probe.
pub struct HostProbe {
    system: System,
}

impl HostProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self { system }
    }

    fn unit_count(&self) -> usize {
        match self.system.cpus().len() {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for HostProbe {
    fn enumerate(&mut self) -> PlatformResult<Vec<ProcessEntry>> {
        self.system.refresh_processes();
        let entries = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                owner: owner_of(process),
            })
            .collect();
        Ok(entries)
    }

    fn sample(&mut self, entry: &ProcessEntry) -> PlatformResult<RawSample> {
        let process = self
            .system
            .process(Pid::from_u32(entry.pid))
            .ok_or_else(|| PlatformError::NotFound(format!("pid {}", entry.pid)))?;

        let (io_ops_total, context_switches_total) = proc_counters(entry.pid)?;

        Ok(RawSample {
            cpu_percent: process.cpu_usage(),
            runtime: Duration::from_secs(process.run_time()),
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
            io_ops_total,
            context_switches_total,
        })
    }
}

impl ComputeUnitSource for HostProbe {
    fn enumerate_units(&mut self) -> PlatformResult<Vec<UnitCategory>> {
        let count = self.unit_count();
        if count == 0 {
            return Err(PlatformError::NotFound("no compute units reported".into()));
        }
        let categories = detect_categories(count);
        debug!("Enumerated {} compute units", categories.len());
        Ok(categories)
    }

    fn utilization(&mut self) -> Option<Vec<f32>> {
        self.system.refresh_cpu();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return None;
        }
        Some(cpus.iter().map(|cpu| cpu.cpu_usage()).collect())
    }
}

#[cfg(unix)]
fn owner_of(process: &sysinfo::Process) -> Option<String> {
    process.user_id().map(|uid| (**uid).to_string())
}

#[cfg(not(unix))]
fn owner_of(_process: &sysinfo::Process) -> Option<String> {
    None
}

// ============================================================================
// /proc counters
// ============================================================================

/// Cumulative (io syscalls, context switches) for a process.
#[cfg(target_os = "linux")]
fn proc_counters(pid: u32) -> PlatformResult<(u64, u64)> {
    use procfs::process::Process;

    let process = Process::new(pid as i32).map_err(map_proc_error)?;
    let status = process.status().map_err(map_proc_error)?;
    let switches = status.voluntary_ctxt_switches.unwrap_or(0)
        + status.nonvoluntary_ctxt_switches.unwrap_or(0);

    // /proc/[pid]/io is root-only for foreign processes; count as zero then.
    let io_ops = process.io().map(|io| io.syscr + io.syscw).unwrap_or(0);

    Ok((io_ops, switches))
}

#[cfg(not(target_os = "linux"))]
fn proc_counters(_pid: u32) -> PlatformResult<(u64, u64)> {
    Ok((0, 0))
}

#[cfg(target_os = "linux")]
fn map_proc_error(err: procfs::ProcError) -> PlatformError {
    match err {
        procfs::ProcError::NotFound(path) => PlatformError::NotFound(format!("{:?}", path)),
        procfs::ProcError::PermissionDenied(path) => {
            PlatformError::PermissionDenied(format!("{:?}", path))
        }
        procfs::ProcError::Incomplete(path) => PlatformError::Malformed(format!("{:?}", path)),
        other => PlatformError::IoError(other.to_string()),
    }
}

// ============================================================================
// Core topology
// ============================================================================

#[cfg(target_os = "linux")]
fn detect_categories(count: usize) -> Vec<UnitCategory> {
    let read = |path: &str| std::fs::read_to_string(path).ok();

    // Intel hybrid parts expose separate PMUs for P and E cores.
    if let (Some(core), Some(atom)) = (
        read("/sys/devices/cpu_core/cpus"),
        read("/sys/devices/cpu_atom/cpus"),
    ) {
        let performance = parse_cpu_list(&core);
        let efficiency = parse_cpu_list(&atom);
        return (0..count)
            .map(|id| {
                if performance.contains(&id) {
                    UnitCategory::Performance
                } else if efficiency.contains(&id) {
                    UnitCategory::Efficiency
                } else {
                    UnitCategory::Unknown
                }
            })
            .collect();
    }

    // big.LITTLE exposes cpu_capacity; otherwise fall back to max frequency.
    let ratings: Vec<Option<u64>> = (0..count)
        .map(|id| {
            let base = format!("/sys/devices/system/cpu/cpu{}", id);
            read(&format!("{}/cpu_capacity", base))
                .or_else(|| read(&format!("{}/cpufreq/cpuinfo_max_freq", base)))
                .and_then(|s| s.trim().parse().ok())
        })
        .collect();
    categorize_by_rating(&ratings)
}

#[cfg(not(target_os = "linux"))]
fn detect_categories(count: usize) -> Vec<UnitCategory> {
    vec![UnitCategory::Unknown; count]
}

/// Parse a sysfs cpu list such as `0-3,8,10-11`.
pub fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<usize>(), hi.trim().parse::<usize>()) {
                    cpus.extend(lo..=hi);
                }
            }
            None => {
                if let Ok(cpu) = part.trim().parse() {
                    cpus.push(cpu);
                }
            }
        }
    }
    cpus
}

/// Units rated at the maximum are performance-class, lower-rated ones are
/// efficiency-class. Missing ratings make every unit unknown.
pub fn categorize_by_rating(ratings: &[Option<u64>]) -> Vec<UnitCategory> {
    if ratings.iter().any(Option::is_none) {
        return vec![UnitCategory::Unknown; ratings.len()];
    }
    let max = ratings.iter().flatten().copied().max().unwrap_or(0);
    ratings
        .iter()
        .map(|rating| match rating {
            Some(r) if *r >= max => UnitCategory::Performance,
            Some(_) => UnitCategory::Efficiency,
            None => UnitCategory::Unknown,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3"), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpu_list("0-1,4,6-7\n"), vec![0, 1, 4, 6, 7]);
        assert_eq!(parse_cpu_list(""), Vec::<usize>::new());
        assert_eq!(parse_cpu_list("x,2"), vec![2]);
    }

    #[test]
    fn test_categorize_hybrid_ratings() {
        let ratings = [Some(1024), Some(1024), Some(446), Some(446)];
        assert_eq!(
            categorize_by_rating(&ratings),
            vec![
                UnitCategory::Performance,
                UnitCategory::Performance,
                UnitCategory::Efficiency,
                UnitCategory::Efficiency,
            ]
        );
    }

    #[test]
    fn test_categorize_homogeneous_and_missing() {
        let uniform = [Some(3_600_000), Some(3_600_000)];
        assert!(categorize_by_rating(&uniform)
            .iter()
            .all(|c| *c == UnitCategory::Performance));

        let missing = [Some(3_600_000), None];
        assert!(categorize_by_rating(&missing)
            .iter()
            .all(|c| *c == UnitCategory::Unknown));
    }

    #[test]
    fn test_host_probe_enumerates_units() {
        let mut probe = HostProbe::new();
        let units = probe.enumerate_units().unwrap();
        assert!(!units.is_empty());
    }

    #[test]
    fn test_host_probe_samples_current_process() {
        let mut probe = HostProbe::new();
        let entries = probe.enumerate().unwrap();
        let me = std::process::id();
        let entry = entries.iter().find(|e| e.pid == me).expect("current process listed");
        let sample = probe.sample(entry).unwrap();
        assert!(sample.memory_mb > 0.0);
    }
}
