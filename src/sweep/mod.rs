//! Request-rate sweep orchestration.
//!
//! This module drives an external benchmark client once per request rate:
//! - Rate parsing and prompt-count derivation
//! - Client argument assembly
//! - Sequential runner with output capture and cool-down
//! - Summary report generation

pub mod args;
pub mod client;
pub mod progress;
pub mod rate;
pub mod record;
pub mod report;
pub mod runner;

pub use args::BaseArgs;
pub use client::{BenchmarkClient, ClientExit, ProcessClient};
pub use progress::{ProgressSnapshot, SweepProgress};
pub use rate::{parse_rate_list, RatePoint};
pub use record::{RunOutcome, RunRecord};
pub use report::SweepReport;
pub use runner::SweepRunner;
