//! Platform Abstraction Traits for Process and Compute-Unit Observation
//!
//! This module defines the collaborators the scheduler core needs from the
//! host environment: a process source that can enumerate and sample live
//! processes, and a compute-unit source that describes the available cores.
//!
//! # Architecture
//!
//! ```text
//! +----------------------+
//! |   Platform Traits    |  <- This module (defines interfaces)
//! +----------------------+
//!            |
//!     +------+------+
//!     |             |
//! +---v----+   +----v-----+
//! | Host   |   | Synthetic|  <- sysinfo/procfs host, or test doubles
//! +--------+   +----------+
//! ```
//!
//! Sources are driven exclusively from the monitor tick, so implementations
//! only need to be `Send`, not `Sync`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Error Types
// ============================================================================

/// Platform-agnostic error type for all host observation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Permission denied (requires elevated privileges)
    PermissionDenied(String),
    /// Resource not found (process exited, core missing, etc.)
    NotFound(String),
    /// Operation not supported on this platform
    NotSupported(String),
    /// I/O error occurred
    IoError(String),
    /// Data read from the host could not be interpreted
    Malformed(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            PlatformError::NotFound(msg) => write!(f, "Not found: {}", msg),
            PlatformError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            PlatformError::IoError(msg) => write!(f, "I/O error: {}", msg),
            PlatformError::Malformed(msg) => write!(f, "Malformed data: {}", msg),
        }
    }
}

impl std::error::Error for PlatformError {}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => PlatformError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => PlatformError::NotFound(err.to_string()),
            _ => PlatformError::IoError(err.to_string()),
        }
    }
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

// ============================================================================
// Process Types
// ============================================================================

/// A process as seen by enumeration, before any metrics are sampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Process ID
    pub pid: u32,
    /// Display name (executable name)
    pub name: String,
    /// Owning user, if the host exposes it
    pub owner: Option<String>,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self { pid, name: name.into(), owner: None }
    }
}

/// One metrics sample for a single process.
///
/// IO and context-switch figures are cumulative counters as reported by the
/// host; the profile store turns them into per-window deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    /// CPU usage percentage over the last sampling window
    pub cpu_percent: f32,
    /// Accumulated runtime of the process
    pub runtime: Duration,
    /// Resident set size in megabytes
    pub memory_mb: f64,
    /// Cumulative IO operations (read + write syscalls)
    pub io_ops_total: u64,
    /// Cumulative context switches (voluntary + involuntary)
    pub context_switches_total: u64,
}

/// Enumerates and samples host processes.
pub trait ProcessSource: Send {
    /// Refresh host state and list the currently observable processes.
    fn enumerate(&mut self) -> PlatformResult<Vec<ProcessEntry>>;

    /// Sample fresh metrics for one enumerated process.
    ///
    /// Failing here (process exited mid-scan, inaccessible) only skips this
    /// process for the current cycle.
    fn sample(&mut self, entry: &ProcessEntry) -> PlatformResult<RawSample>;
}

// ============================================================================
// Compute Unit Types
// ============================================================================

/// Capability class of a compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitCategory {
    /// High-performance core (P-core, big core)
    Performance,
    /// Power-efficient core (E-core, LITTLE core)
    Efficiency,
    /// Accelerator or otherwise specialised execution context
    Specialized,
    /// Category could not be determined
    Unknown,
}

impl UnitCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitCategory::Performance => "performance",
            UnitCategory::Efficiency => "efficiency",
            UnitCategory::Specialized => "specialized",
            UnitCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the host's compute units.
pub trait ComputeUnitSource: Send {
    /// Enumerate compute units once at startup, indexed densely from 0.
    fn enumerate_units(&mut self) -> PlatformResult<Vec<UnitCategory>>;

    /// Current utilization percentage per unit, when cheaply available.
    fn utilization(&mut self) -> Option<Vec<f32>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_display() {
        let err = PlatformError::NotFound("pid 42".to_string());
        assert_eq!(format!("{}", err), "Not found: pid 42");

        let err = PlatformError::PermissionDenied("/proc/1/io".to_string());
        assert_eq!(format!("{}", err), "Permission denied: /proc/1/io");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(PlatformError::from(io), PlatformError::PermissionDenied(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(PlatformError::from(io), PlatformError::NotFound(_)));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "weird");
        assert!(matches!(PlatformError::from(io), PlatformError::IoError(_)));
    }

    #[test]
    fn test_unit_category_serde_names() {
        let json = serde_json::to_string(&UnitCategory::Performance).unwrap();
        assert_eq!(json, "\"performance\"");
        assert_eq!(UnitCategory::Efficiency.to_string(), "efficiency");
    }
}
