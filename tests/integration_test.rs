// Integration tests for the rate sweep
//
// These tests drive full sweeps against a scripted benchmark client and
// check the run files, ordering, failure handling and completion signal.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use latency_profile_generator::{
    completion::CompletionSignal,
    config::{FailurePolicy, SweepConfig},
    error::SweepError,
    routes::{self, StatusState},
    sweep::{parse_rate_list, BenchmarkClient, ClientExit, RunOutcome, SweepReport, SweepRunner},
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// One recorded client invocation
#[derive(Debug, Clone)]
struct Call {
    args: Vec<String>,
    at: tokio::time::Instant,
    completed_before: bool,
}

/// Fake benchmark client: prints canned output and exits with scripted codes
struct ScriptedClient {
    exit_codes: Vec<i32>,
    spawn_failures: Vec<usize>,
    completion: CompletionSignal,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    fn new(completion: CompletionSignal) -> Self {
        Self {
            exit_codes: vec![],
            spawn_failures: vec![],
            completion,
            calls: Mutex::new(vec![]),
        }
    }

    fn with_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.exit_codes = codes;
        self
    }

    fn with_spawn_failure(mut self, call_index: usize) -> Self {
        self.spawn_failures.push(call_index);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BenchmarkClient for ScriptedClient {
    async fn run(
        &self,
        args: &[String],
        mut stdout: std::fs::File,
    ) -> latency_profile_generator::error::Result<ClientExit> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                args: args.to_vec(),
                at: tokio::time::Instant::now(),
                completed_before: self.completion.is_complete(),
            });
            calls.len() - 1
        };

        if self.spawn_failures.contains(&index) {
            return Err(SweepError::Spawn {
                program: "scripted".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }

        let code = self.exit_codes.get(index).copied().unwrap_or(0);
        writeln!(stdout, "run {} args: {}", index + 1, args.join(" ")).unwrap();
        if code != 0 {
            writeln!(stdout, "Error: benchmark failed").unwrap();
        }
        Ok(ClientExit::with_code(code))
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

fn sweep_config(output_dir: &Path, rates: &str) -> SweepConfig {
    SweepConfig {
        ip: "10.0.0.7".to_string(),
        port: 8000,
        backend: "vllm".to_string(),
        dataset: "ShareGPT_V3_unfiltered_cleaned_split.json".to_string(),
        tokenizer: "meta-llama/Llama-2-7b-hf".to_string(),
        max_input_length: 1024,
        max_output_length: 1024,
        models: vec!["meta-llama/Llama-2-7b-hf".to_string()],
        traffic_split: None,
        file_prefix: "benchmark".to_string(),
        pm_namespace: "default".to_string(),
        pm_job: "vllm-podmonitoring".to_string(),
        output_bucket: None,
        output_bucket_filepath: None,
        scrape_server_metrics: false,
        save_aggregated_result: false,
        stream_request: false,
        save_json_results: true,
        benchmark_duration_secs: 60,
        max_num_prompts: 1000,
        request_rates: parse_rate_list(rates).unwrap(),
        cooldown: Duration::from_secs(30),
        failure_policy: FailurePolicy::Continue,
        output_dir: output_dir.to_path_buf(),
        client_command: vec!["scripted".to_string()],
        status_port: None,
        completion_file: None,
        log_level: "info".to_string(),
    }
}

fn build_runner(
    config: SweepConfig,
    client: Arc<ScriptedClient>,
    completion: CompletionSignal,
) -> SweepRunner {
    SweepRunner::new(Arc::new(config), client)
        .with_completion(completion)
        .with_echo(std::io::sink())
}

/// Run files in the output directory, sorted by name
fn run_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().starts_with("latency-profile-"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("--{}=", name);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

/// Helper to parse JSON response body
async fn parse_json_body(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ==================================================================================================
// Sweep Tests
// ==================================================================================================

#[tokio::test(start_paused = true)]
async fn test_end_to_end_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()));
    let runner = build_runner(
        sweep_config(dir.path(), "0,5,10"),
        client.clone(),
        completion.clone(),
    );

    let records = runner.run().await.unwrap();

    // One record per rate, in input order
    let rates: Vec<String> = records.iter().map(|r| r.rate.to_string()).collect();
    let prompts: Vec<u64> = records.iter().map(|r| r.prompt_count).collect();
    assert_eq!(rates, vec!["inf", "5", "10"]);
    assert_eq!(prompts, vec![1000, 300, 600]);

    let calls = client.calls();
    assert_eq!(calls.len(), 3);
    let passed: Vec<(&str, &str)> = calls
        .iter()
        .map(|c| {
            (
                arg_value(&c.args, "request-rate").unwrap(),
                arg_value(&c.args, "num-prompts").unwrap(),
            )
        })
        .collect();
    assert_eq!(passed, vec![("inf", "1000"), ("5", "300"), ("10", "600")]);

    // Three files, created in order, each holding its run's output
    let files = run_files(dir.path());
    assert_eq!(files.len(), 3);
    for (i, (file, record)) in files.iter().zip(&records).enumerate() {
        assert_eq!(file, &record.output_file);
        let content = std::fs::read_to_string(file).unwrap();
        assert!(content.starts_with(&format!("run {} ", i + 1)));
        assert_eq!(content, record.output);
    }

    // Runs are separated by the cool-down
    for pair in calls.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(30));
    }

    // Completion is only signalled after the last run
    assert!(calls.iter().all(|c| !c.completed_before));
    assert!(completion.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_does_not_stop_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()).with_exit_codes(vec![0, 1, 0]));
    let runner = build_runner(
        sweep_config(dir.path(), "0,5,10"),
        client.clone(),
        completion.clone(),
    );

    let records = runner.run().await.unwrap();

    assert_eq!(records.len(), 3);
    assert!(records[0].is_success());
    assert!(!records[1].is_success());
    assert!(records[2].is_success());
    assert_eq!(run_files(dir.path()).len(), 3);

    // Client error text is captured like any other output
    assert!(records[1].output.contains("Error: benchmark failed"));
    assert!(completion.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_spawn_failure_is_recorded_and_sweep_continues() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()).with_spawn_failure(0));
    let runner = build_runner(
        sweep_config(dir.path(), "1,2"),
        client.clone(),
        completion.clone(),
    );

    let records = runner.run().await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(matches!(records[0].outcome, RunOutcome::Errored { .. }));
    assert!(records[0].output.is_empty());
    assert!(records[1].is_success());

    // The failed run still leaves its (empty) file behind
    assert_eq!(run_files(dir.path()).len(), 2);
    assert!(completion.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_abort_policy_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()).with_exit_codes(vec![0, 2, 0]));
    let mut config = sweep_config(dir.path(), "0,5,10");
    config.failure_policy = FailurePolicy::Abort;
    let runner = build_runner(config, client.clone(), completion.clone());

    let err = runner.run().await.unwrap_err();

    match err {
        SweepError::RunFailed {
            sequence,
            rate,
            reason,
        } => {
            assert_eq!(sequence, 2);
            assert_eq!(rate, "5");
            assert_eq!(reason, "exit code 2");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(client.calls().len(), 2);
    assert_eq!(run_files(dir.path()).len(), 2);
    assert!(!completion.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_aborted_sweep_keeps_records_for_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()).with_exit_codes(vec![0, 2, 0]));
    let mut config = sweep_config(dir.path(), "0,5,10");
    config.failure_policy = FailurePolicy::Abort;
    let runner = build_runner(config, client, completion);

    assert!(runner.run().await.is_err());

    let records = runner.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].is_success());
    assert!(!records[1].is_success());
    assert_eq!(records[1].sequence, 2);

    let report = SweepReport::from_records(&records);
    let path = report.write_to(dir.path()).await.unwrap();
    let manifest: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(manifest["runs"].as_array().unwrap().len(), 2);
    assert_eq!(manifest["succeeded"], 1);
    assert_eq!(manifest["failed"], 1);
    assert_eq!(manifest["runs"][1]["exit_code"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_optional_flags_absent_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()));
    let runner = build_runner(sweep_config(dir.path(), "5"), client.clone(), completion);

    runner.run().await.unwrap();

    let args = &client.calls()[0].args;
    assert!(args.iter().all(|a| !a.starts_with("--traffic-split")));
    assert!(args.iter().all(|a| !a.starts_with("--output-bucket")));
    assert!(args.iter().all(|a| a != "--stream-request"));
    assert!(args.iter().any(|a| a == "--save-json-results"));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_sweeps_produce_same_arguments() {
    let mut arg_sets = Vec::new();

    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let completion = CompletionSignal::new();
        let client = Arc::new(ScriptedClient::new(completion.clone()));
        let runner = build_runner(
            sweep_config(dir.path(), "0,2.5,7"),
            client.clone(),
            completion,
        );
        runner.run().await.unwrap();
        arg_sets.push(
            client
                .calls()
                .into_iter()
                .map(|c| c.args)
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(arg_sets[0], arg_sets[1]);
}

#[tokio::test(start_paused = true)]
async fn test_output_directory_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("results/llama");
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()));
    let runner = build_runner(sweep_config(&nested, "1"), client, completion);

    runner.run().await.unwrap();
    assert_eq!(run_files(&nested).len(), 1);
}

// ==================================================================================================
// Status Endpoint Tests
// ==================================================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()));
    let dir = tempfile::tempdir().unwrap();
    let runner = build_runner(sweep_config(dir.path(), "1"), client, completion.clone());

    let app = routes::build_app(StatusState {
        completion,
        progress: runner.progress(),
    });

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_json_body(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_status_endpoint_reports_completion() {
    let dir = tempfile::tempdir().unwrap();
    let completion = CompletionSignal::new();
    let client = Arc::new(ScriptedClient::new(completion.clone()).with_exit_codes(vec![0, 1]));
    let runner = build_runner(sweep_config(dir.path(), "0,5"), client, completion.clone());

    let app = routes::build_app(StatusState {
        completion: completion.clone(),
        progress: runner.progress(),
    });

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_json_body(response.into_body()).await;
    assert_eq!(body["finished"], false);
    assert_eq!(body["progress"]["total_runs"], 2);
    assert_eq!(body["progress"]["finished_runs"], 0);

    runner.run().await.unwrap();

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = parse_json_body(response.into_body()).await;
    assert_eq!(body["finished"], true);
    assert_eq!(body["progress"]["finished_runs"], 2);
    assert_eq!(body["progress"]["failed_runs"], 1);
    assert!(body["progress"]["current_rate"].is_null());
}
