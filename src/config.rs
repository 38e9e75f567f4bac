use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SweepError;
use crate::sweep::rate::{parse_rate_list, RatePoint};

/// Latency Profile Generator - request-rate sweep orchestrator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Address of the model server under test
    #[arg(long, env = "IP")]
    pub ip: String,

    /// Port of the model server under test
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Prompt dataset file passed to the benchmark client
    #[arg(long, env = "PROMPT_DATASET_FILE")]
    pub dataset: String,

    /// Tokenizer name or path
    #[arg(long, env = "TOKENIZER")]
    pub tokenizer: String,

    /// Model server backend (vllm, tgi, jetstream, ...)
    #[arg(long, env = "BACKEND", default_value = "vllm")]
    pub backend: String,

    /// Maximum input length in tokens
    #[arg(long, env = "INPUT_LENGTH", default_value = "1024")]
    pub input_length: u32,

    /// Maximum output length in tokens
    #[arg(long, env = "OUTPUT_LENGTH", default_value = "1024")]
    pub output_length: u32,

    /// Prefix for result files written by the benchmark client
    #[arg(long, env = "FILE_PREFIX", default_value = "benchmark")]
    pub file_prefix: String,

    /// Comma-separated list of models to benchmark
    #[arg(long, env = "MODELS")]
    pub models: String,

    /// Namespace of the pod monitoring object
    #[arg(long, env = "PM_NAMESPACE", default_value = "default")]
    pub pm_namespace: String,

    /// Name of the pod monitoring object
    #[arg(long, env = "PM_JOB", default_value = "vllm-podmonitoring")]
    pub pm_job: String,

    /// Benchmark duration per request rate in seconds
    #[arg(long, env = "BENCHMARK_TIME_SECONDS", default_value = "120")]
    pub benchmark_time_seconds: u64,

    /// Prompt ceiling for the unbounded request rate
    #[arg(long, env = "MAX_NUM_PROMPTS", default_value = "1000")]
    pub max_num_prompts: u64,

    /// Comma-separated request rates; 0 or inf means unbounded
    #[arg(long, env = "REQUEST_RATES")]
    pub request_rates: String,

    /// Comma-separated traffic split across models, e.g. 0.9,0.1
    #[arg(long, env = "TRAFFIC_SPLIT")]
    pub traffic_split: Option<String>,

    /// Storage bucket the client uploads JSON results to
    #[arg(long, env = "OUTPUT_BUCKET")]
    pub output_bucket: Option<String>,

    /// Path inside the output bucket
    #[arg(long, env = "OUTPUT_BUCKET_FILEPATH")]
    pub output_bucket_filepath: Option<String>,

    /// Ask the client to scrape server metrics
    #[arg(long, env = "SCRAPE_SERVER_METRICS", value_parser = BoolishValueParser::new())]
    pub scrape_server_metrics: bool,

    /// Ask the client to save results aggregated across models
    #[arg(long, env = "SAVE_AGGREGATED_RESULT", value_parser = BoolishValueParser::new())]
    pub save_aggregated_result: bool,

    /// Ask the client to stream requests (needed for TTFT)
    #[arg(long, env = "STREAM_REQUEST", value_parser = BoolishValueParser::new())]
    pub stream_request: bool,

    /// Ask the client to save JSON results (on unless set to a false value)
    #[arg(
        long,
        env = "SAVE_JSON_RESULTS",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "true",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub save_json_results: bool,

    /// Pause between runs in seconds
    #[arg(long, env = "COOLDOWN_SECONDS", default_value = "30")]
    pub cooldown_seconds: u64,

    /// Directory for run output files
    #[arg(long, env = "OUTPUT_DIR", default_value = ".")]
    pub output_dir: String,

    /// Benchmark client command line, arguments appended per run
    #[arg(long, env = "CLIENT_COMMAND", default_value = "python3 benchmark_serving.py")]
    pub client_command: String,

    /// What to do when a run fails (continue, abort)
    #[arg(long, env = "ON_RUN_FAILURE", default_value = "continue")]
    pub on_run_failure: String,

    /// Port for the HTTP status endpoint (disabled when unset)
    #[arg(long, env = "STATUS_PORT")]
    pub status_port: Option<u16>,

    /// File written with "true" once the sweep has completed
    #[arg(long, env = "COMPLETION_FILE")]
    pub completion_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct SweepConfig {
    // Model server
    pub ip: String,
    pub port: u16,
    pub backend: String,

    // Workload
    pub dataset: String,
    pub tokenizer: String,
    pub max_input_length: u32,
    pub max_output_length: u32,
    pub models: Vec<String>,
    pub traffic_split: Option<Vec<f64>>,

    // Result tagging and storage
    pub file_prefix: String,
    pub pm_namespace: String,
    pub pm_job: String,
    pub output_bucket: Option<String>,
    pub output_bucket_filepath: Option<String>,

    // Client feature toggles
    pub scrape_server_metrics: bool,
    pub save_aggregated_result: bool,
    pub stream_request: bool,
    pub save_json_results: bool,

    // Sweep
    pub benchmark_duration_secs: u64,
    pub max_num_prompts: u64,
    pub request_rates: Vec<RatePoint>,
    pub cooldown: Duration,
    pub failure_policy: FailurePolicy,
    pub output_dir: PathBuf,
    pub client_command: Vec<String>,

    // Observers
    pub status_port: Option<u16>,
    pub completion_file: Option<PathBuf>,

    pub log_level: String,
}

/// How the sweep reacts to a failed run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next rate
    #[default]
    Continue,
    /// Stop the sweep at the first failed run
    Abort,
}

impl SweepConfig {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Build and validate a configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let models: Vec<String> = split_list(&args.models);

        let traffic_split = non_blank(args.traffic_split)
            .map(|s| parse_traffic_split(&s))
            .transpose()?;

        let config = SweepConfig {
            ip: args.ip,
            port: args.port,
            backend: args.backend,

            dataset: args.dataset,
            tokenizer: args.tokenizer,
            max_input_length: args.input_length,
            max_output_length: args.output_length,
            models,
            traffic_split,

            file_prefix: args.file_prefix,
            pm_namespace: args.pm_namespace,
            pm_job: args.pm_job,
            output_bucket: non_blank(args.output_bucket),
            output_bucket_filepath: non_blank(args.output_bucket_filepath),

            scrape_server_metrics: args.scrape_server_metrics,
            save_aggregated_result: args.save_aggregated_result,
            stream_request: args.stream_request,
            save_json_results: args.save_json_results,

            benchmark_duration_secs: args.benchmark_time_seconds,
            max_num_prompts: args.max_num_prompts,
            request_rates: parse_rate_list(&args.request_rates)
                .context("Failed to parse REQUEST_RATES")?,
            cooldown: Duration::from_secs(args.cooldown_seconds),
            failure_policy: parse_failure_policy(&args.on_run_failure)?,
            output_dir: expand_tilde(&args.output_dir),
            client_command: args
                .client_command
                .split_whitespace()
                .map(str::to_string)
                .collect(),

            status_port: args.status_port,
            completion_file: non_blank(args.completion_file).map(|s| expand_tilde(&s)),

            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ip.trim().is_empty() {
            anyhow::bail!("IP must not be empty");
        }

        if self.models.is_empty() {
            anyhow::bail!("MODELS must name at least one model");
        }

        if let Some(split) = &self.traffic_split {
            if split.len() != self.models.len() {
                anyhow::bail!(
                    "TRAFFIC_SPLIT has {} weights but MODELS lists {} models",
                    split.len(),
                    self.models.len()
                );
            }
        }

        if self.output_bucket_filepath.is_some() && self.output_bucket.is_none() {
            anyhow::bail!("OUTPUT_BUCKET_FILEPATH requires OUTPUT_BUCKET to be set");
        }

        let has_finite_rate = self.request_rates.iter().any(|r| !r.is_unbounded());
        if has_finite_rate && self.benchmark_duration_secs == 0 {
            anyhow::bail!("BENCHMARK_TIME_SECONDS must be positive");
        }

        let has_unbounded_rate = self.request_rates.iter().any(RatePoint::is_unbounded);
        if has_unbounded_rate && self.max_num_prompts == 0 {
            anyhow::bail!("MAX_NUM_PROMPTS must be positive when an unbounded rate is requested");
        }

        if self.client_command.is_empty() {
            anyhow::bail!("CLIENT_COMMAND must not be empty");
        }

        Ok(())
    }

    /// Traffic split rendered the way the client expects it
    pub fn traffic_split_arg(&self) -> Option<String> {
        self.traffic_split.as_ref().map(|weights| {
            weights
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
    }
}

/// Parse comma-separated traffic weights; they must sum to 1.0
pub fn parse_traffic_split(s: &str) -> std::result::Result<Vec<f64>, SweepError> {
    let weights = split_list(s)
        .iter()
        .map(|w| {
            w.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| SweepError::InvalidTrafficSplit(format!("bad weight '{}'", w)))
        })
        .collect::<std::result::Result<Vec<f64>, SweepError>>()?;

    if weights.is_empty() {
        return Err(SweepError::InvalidTrafficSplit(
            "at least one weight is required".to_string(),
        ));
    }

    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(SweepError::InvalidTrafficSplit(format!(
            "weights must sum to 1.0 (got {})",
            sum
        )));
    }

    Ok(weights)
}

/// Parse failure policy from string
fn parse_failure_policy(s: &str) -> Result<FailurePolicy> {
    match s.trim().to_lowercase().as_str() {
        "" | "continue" => Ok(FailurePolicy::Continue),
        "abort" => Ok(FailurePolicy::Abort),
        other => anyhow::bail!("ON_RUN_FAILURE must be 'continue' or 'abort' (got '{}')", other),
    }
}

/// Split a comma-separated list, dropping blank entries
fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Treat blank values (common in templated env files) as unset
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
