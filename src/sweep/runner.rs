//! Sequential rate sweep with per-run output capture and cool-down.

use chrono::Utc;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::completion::CompletionSignal;
use crate::config::{FailurePolicy, SweepConfig};
use crate::error::{Result, SweepError};

use super::args::BaseArgs;
use super::client::{BenchmarkClient, ClientExit};
use super::progress::SweepProgress;
use super::rate::RatePoint;
use super::record::{run_file_name, RunOutcome, RunRecord};

/// Runs one benchmark per configured rate, strictly in order
pub struct SweepRunner {
    config: Arc<SweepConfig>,
    client: Arc<dyn BenchmarkClient>,
    base_args: BaseArgs,
    completion: CompletionSignal,
    progress: Arc<SweepProgress>,
    echo: Mutex<Box<dyn Write + Send>>,
    records: Mutex<Vec<RunRecord>>,
}

impl SweepRunner {
    /// Create a new sweep runner that echoes run output to stdout
    pub fn new(config: Arc<SweepConfig>, client: Arc<dyn BenchmarkClient>) -> Self {
        let base_args = BaseArgs::from_config(&config);
        let progress = Arc::new(SweepProgress::new(config.request_rates.len()));

        Self {
            config,
            client,
            base_args,
            completion: CompletionSignal::new(),
            progress,
            echo: Mutex::new(Box::new(std::io::stdout())),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Send echoed run output somewhere other than stdout
    pub fn with_echo(mut self, echo: impl Write + Send + 'static) -> Self {
        self.echo = Mutex::new(Box::new(echo));
        self
    }

    /// Share an existing completion signal with this runner
    pub fn with_completion(mut self, completion: CompletionSignal) -> Self {
        self.completion = completion;
        self
    }

    pub fn completion(&self) -> CompletionSignal {
        self.completion.clone()
    }

    pub fn progress(&self) -> Arc<SweepProgress> {
        self.progress.clone()
    }

    /// Records of every run finished so far, including the one that aborted a sweep
    pub fn records(&self) -> Vec<RunRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Run the full sweep.
    ///
    /// Marks the completion signal after the last rate's cool-down. Under
    /// `FailurePolicy::Abort` the first failed run ends the sweep with an
    /// error and the signal stays unset; `records` still holds the runs made.
    pub async fn run(&self) -> Result<Vec<RunRecord>> {
        let rates = &self.config.request_rates;
        let output_dir = &self.config.output_dir;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| SweepError::io(output_dir, e))?;

        tracing::info!(
            "Starting sweep over {} rates with {} ({}s per rate, {:?} cool-down)",
            rates.len(),
            self.client.name(),
            self.config.benchmark_duration_secs,
            self.config.cooldown
        );

        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }

        for (index, &rate) in rates.iter().enumerate() {
            let record = self.run_point(index + 1, rate).await;
            self.progress.run_finished(&record);
            let failure = record.failure_reason();
            if let Ok(mut records) = self.records.lock() {
                records.push(record);
            }

            if let Some(reason) = failure {
                tracing::warn!("Run {} at rate {} failed: {}", index + 1, rate, reason);

                if self.config.failure_policy == FailurePolicy::Abort {
                    return Err(SweepError::RunFailed {
                        sequence: index + 1,
                        rate: rate.to_string(),
                        reason,
                    });
                }
            }

            tracing::info!("Cooling down for {:?}", self.config.cooldown);
            tokio::time::sleep(self.config.cooldown).await;
        }

        self.completion.mark_complete();
        let records = self.records();
        tracing::info!("Sweep complete: {} runs", records.len());

        Ok(records)
    }

    /// Execute a single rate point. Never fails: errors land on the record.
    async fn run_point(&self, sequence: usize, rate: RatePoint) -> RunRecord {
        let prompt_count = rate.prompt_count(
            self.config.benchmark_duration_secs,
            self.config.max_num_prompts,
        );
        let args = self.base_args.for_rate(rate, prompt_count);

        let started_at = Utc::now();
        let output_file = self
            .config
            .output_dir
            .join(run_file_name(started_at, sequence));

        self.progress.run_started(rate);
        tracing::info!(
            "Run {}/{}: rate={} prompts={} output={}",
            sequence,
            self.config.request_rates.len(),
            rate,
            prompt_count,
            output_file.display()
        );

        let timer = Instant::now();
        let outcome = match self.execute(&args, &output_file).await {
            Ok(exit) => RunOutcome::Completed { exit },
            Err(e) => {
                tracing::error!("Run {} could not complete: {}", sequence, e);
                RunOutcome::Errored {
                    error: e.to_string(),
                }
            }
        };
        tracing::info!(
            "Run {} finished in {:.1}s ({:?})",
            sequence,
            timer.elapsed().as_secs_f64(),
            outcome
        );

        let output = self.echo_output(&output_file).await;

        RunRecord {
            sequence,
            rate,
            prompt_count,
            output_file,
            args,
            started_at,
            finished_at: Utc::now(),
            outcome,
            output,
        }
    }

    async fn execute(&self, args: &[String], output_file: &Path) -> Result<ClientExit> {
        let file = tokio::fs::File::create(output_file)
            .await
            .map_err(|e| SweepError::io(output_file, e))?;

        self.client.run(args, file.into_std().await).await
    }

    /// Read the captured output back and pass it through to the echo sink
    async fn echo_output(&self, output_file: &Path) -> String {
        let output = match tokio::fs::read(output_file).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", output_file.display(), e);
                return String::new();
            }
        };

        if let Ok(mut echo) = self.echo.lock() {
            if let Err(e) = echo.write_all(output.as_bytes()).and_then(|_| echo.flush()) {
                tracing::warn!("Failed to echo run output: {}", e);
            }
        }

        output
    }
}
