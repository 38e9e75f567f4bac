//! Run records: what one benchmark invocation did and where its output went.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use super::client::ClientExit;
use super::rate::RatePoint;

/// Prefix for captured client output files
pub const RUN_FILE_PREFIX: &str = "latency-profile";

/// Output file name for a run.
///
/// The timestamp is UTC with second granularity, so names never step backwards
/// across a daylight-saving change; the zero-padded sequence number keeps names
/// unique and in creation order when several runs start within one second.
pub fn run_file_name(started_at: DateTime<Utc>, sequence: usize) -> String {
    format!(
        "{}-{}-{:04}.txt",
        RUN_FILE_PREFIX,
        started_at.format("%Y-%m-%d_%H-%M-%S"),
        sequence
    )
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The client ran to completion (successfully or not)
    Completed { exit: ClientExit },
    /// The run could not be carried out (spawn or output file failure)
    Errored { error: String },
}

/// One execution of the benchmark client for one rate point
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    /// 1-based position in the sweep
    pub sequence: usize,
    pub rate: RatePoint,
    pub prompt_count: u64,
    pub output_file: PathBuf,
    pub args: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    /// Captured client output, persisted in `output_file`
    #[serde(skip)]
    pub output: String,
}

impl RunRecord {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, RunOutcome::Completed { exit } if exit.is_success())
    }

    /// Why the run counts as failed, if it does
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            RunOutcome::Completed { exit } if exit.is_success() => None,
            RunOutcome::Completed { exit } => Some(exit.to_string()),
            RunOutcome::Errored { error } => Some(error.clone()),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
