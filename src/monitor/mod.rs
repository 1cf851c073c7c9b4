//! Process monitoring loop and report rendering

pub mod dashboard;
pub mod realtime;

pub use dashboard::render_report;
pub use realtime::{HostProbes, RealtimeMonitor, TickSummary};
