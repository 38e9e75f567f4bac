//! Report generation for sweep results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::rate::RatePoint;
use super::record::{RunOutcome, RunRecord};
use crate::error::{Result, SweepError};

/// Summary of a complete sweep, written next to the run files
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    /// Host the orchestrator ran on
    pub host: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub runs: Vec<RunSummary>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Results for a single rate point
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub sequence: usize,
    pub rate: RatePoint,
    pub prompt_count: u64,
    pub output_file: PathBuf,
    pub elapsed_secs: f64,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub output_bytes: usize,
    pub args: Vec<String>,
}

impl SweepReport {
    /// Create a report from run records
    pub fn from_records(records: &[RunRecord]) -> Self {
        let runs: Vec<RunSummary> = records
            .iter()
            .map(|record| {
                let (exit_code, error) = match &record.outcome {
                    RunOutcome::Completed { exit } => (exit.code, None),
                    RunOutcome::Errored { error } => (None, Some(error.clone())),
                };
                RunSummary {
                    sequence: record.sequence,
                    rate: record.rate,
                    prompt_count: record.prompt_count,
                    output_file: record.output_file.clone(),
                    elapsed_secs: record.elapsed_secs(),
                    exit_code,
                    error,
                    output_bytes: record.output.len(),
                    args: record.args.clone(),
                }
            })
            .collect();

        let succeeded = records.iter().filter(|r| r.is_success()).count();

        Self {
            sweep_id: Uuid::new_v4(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            started_at: records.first().map(|r| r.started_at),
            finished_at: records.last().map(|r| r.finished_at),
            failed: runs.len() - succeeded,
            succeeded,
            runs,
        }
    }

    /// Print the report as an ASCII table
    pub fn print_table(&self) {
        println!();
        println!("┌──────┬──────────┬──────────┬────────────┬──────────────┬──────────────────────────────────────────────┐");
        println!("│ Run  │   Rate   │ Prompts  │ Elapsed(s) │    Status    │ Output                                       │");
        println!("├──────┼──────────┼──────────┼────────────┼──────────────┼──────────────────────────────────────────────┤");

        for run in &self.runs {
            let file_name = run
                .output_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!(
                "│ {:>4} │ {:>8} │ {:>8} │ {:>10.1} │ {:<12} │ {:<44} │",
                run.sequence,
                run.rate.to_string(),
                run.prompt_count,
                run.elapsed_secs,
                run.status_label(),
                file_name
            );
        }

        println!("└──────┴──────────┴──────────┴────────────┴──────────────┴──────────────────────────────────────────────┘");
        println!(
            "{} runs: {} succeeded, {} failed",
            self.runs.len(),
            self.succeeded,
            self.failed
        );
        println!();
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// File name of the JSON manifest
    pub fn file_name(&self) -> String {
        let stamp = self
            .started_at
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d_%H-%M-%S");
        format!("sweep-summary-{}.json", stamp)
    }

    /// Write the JSON manifest into `dir`, returning its path
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, self.to_json())
            .await
            .map_err(|e| SweepError::io(&path, e))?;
        Ok(path)
    }
}

impl RunSummary {
    fn status_label(&self) -> String {
        match (self.exit_code, &self.error) {
            (_, Some(_)) => "error".to_string(),
            (Some(0), None) => "ok".to_string(),
            (Some(code), None) => format!("exit {}", code),
            (None, None) => "signal".to_string(),
        }
    }
}
