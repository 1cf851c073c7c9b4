//! Scheduler report: data model and network endpoint
//!
//! The same report backs the CLI text output, `--json`, and the TCP
//! endpoint.

pub mod data;
pub mod server;

pub use data::{ProfileRow, ReportTotals, SchedulerReport, ServerMessage, UnitRow};
pub use server::{ReportProvider, ReportServer};
