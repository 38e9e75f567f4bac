use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use latency_profile_generator::completion::{CompletionFile, CompletionSignal};
use latency_profile_generator::config::SweepConfig;
use latency_profile_generator::routes::{self, StatusState};
use latency_profile_generator::sweep::{ProcessClient, SweepReport, SweepRunner};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level); invalid input fails before any run
    let config = SweepConfig::load()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 Latency profile generator starting...");
    tracing::info!("Target server: {}:{}", config.ip, config.port);
    tracing::debug!("Configuration: {:?}", config);

    print_startup_banner(&config);

    let config = Arc::new(config);
    let client = Arc::new(ProcessClient::from_command(&config.client_command)?);
    let completion = CompletionSignal::new();
    let runner = SweepRunner::new(config.clone(), client).with_completion(completion.clone());

    let completion_file = config.completion_file.as_ref().map(CompletionFile::new);
    if let Some(file) = &completion_file {
        file.reset()
            .await
            .context("Failed to initialize completion file")?;
    }

    if let Some(port) = config.status_port {
        let state = StatusState {
            completion: completion.clone(),
            progress: runner.progress(),
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tokio::spawn(async move {
            if let Err(e) = routes::serve_status(addr, state).await {
                tracing::error!("❌ Status endpoint failed: {}", e);
            }
        });
    }

    let result = runner.run().await;

    // The manifest covers whatever ran, including a sweep cut short by an abort
    let report = SweepReport::from_records(&runner.records());
    report.print_table();
    match report.write_to(&config.output_dir).await {
        Ok(path) => tracing::info!("📊 Sweep summary written to {}", path.display()),
        Err(e) => tracing::warn!("Failed to write sweep summary: {}", e),
    }
    result.context("Sweep aborted")?;

    if let Some(file) = &completion_file {
        match file.publish(&completion).await {
            Ok(()) => tracing::info!("Completion published to {}", file.path().display()),
            Err(e) => tracing::error!("❌ Failed to publish completion: {}", e),
        }
    }

    // Stay alive so supervisors can observe completion; teardown is external
    tracing::info!("✅ Sweep finished; idling until terminated");
    shutdown_signal().await;
    tracing::info!("👋 Shutdown complete");

    Ok(())
}

/// Print startup banner
fn print_startup_banner(config: &SweepConfig) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║              📈 Latency Profile Generator                 ║
║                                                           ║
║  Request-rate sweep for LLM serving benchmarks            ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    let rates: Vec<String> = config
        .request_rates
        .iter()
        .map(|r| r.to_string())
        .collect();

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("  Server:      {}:{} ({})", config.ip, config.port, config.backend);
    println!("  Models:      {}", config.models.join(", "));
    println!("  Rates:       {}", rates.join(", "));
    println!(
        "  Duration:    {}s per rate, {}s cool-down",
        config.benchmark_duration_secs,
        config.cooldown.as_secs()
    );
    println!("  Max prompts: {}", config.max_num_prompts);
    println!("  Output dir:  {}", config.output_dir.display());
    println!("  On failure:  {:?}", config.failure_policy);
    println!();
}

/// Wait for an external termination signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}
