//! Benchmark client abstraction and the subprocess implementation.

use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;

use crate::error::{Result, SweepError};

/// How a client run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientExit {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl ClientExit {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ClientExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Something that can execute one benchmark run.
///
/// Implementations must write everything the client prints to `stdout` and
/// return only after the run has finished.
#[async_trait]
pub trait BenchmarkClient: Send + Sync {
    async fn run(&self, args: &[String], stdout: std::fs::File) -> Result<ClientExit>;

    /// Human-readable name for logs
    fn name(&self) -> String;
}

/// Runs the benchmark client as a child process
#[derive(Debug, Clone)]
pub struct ProcessClient {
    program: String,
    base_args: Vec<String>,
}

impl ProcessClient {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Build from a split command line such as `["python3", "benchmark_serving.py"]`
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, rest) = command.split_first().ok_or_else(|| {
            SweepError::Config("benchmark client command is empty".to_string())
        })?;
        Ok(Self::new(program.clone(), rest.to_vec()))
    }
}

#[async_trait]
impl BenchmarkClient for ProcessClient {
    async fn run(&self, args: &[String], stdout: std::fs::File) -> Result<ClientExit> {
        tracing::debug!("Spawning {} {:?} {:?}", self.program, self.base_args, args);

        let status = tokio::process::Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| SweepError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(ClientExit {
            code: status.code(),
        })
    }

    fn name(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
