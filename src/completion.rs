// Sweep completion signal
//
// A one-way flag shared between the sweep loop and whatever supervises it
// (status endpoint, completion file, tests).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::{Result, SweepError};

#[derive(Debug, Default)]
struct Inner {
    completed: AtomicBool,
    notify: Notify,
}

/// Shared, clonable completion state for one sweep.
///
/// Starts incomplete; `mark_complete` flips it exactly once and it stays set.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    inner: Arc<Inner>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the sweep as complete and wake all waiters.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_complete(&self) -> bool {
        let first = !self.inner.completed.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Check whether the sweep has completed
    pub fn is_complete(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }

    /// Wait until the sweep has completed
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

/// Writes the completion state to a file so external watchers can poll it
#[derive(Debug, Clone)]
pub struct CompletionFile {
    path: PathBuf,
}

impl CompletionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write "false" so stale files from a previous sweep do not read as done
    pub async fn reset(&self) -> Result<()> {
        self.write("false").await
    }

    pub async fn publish(&self, signal: &CompletionSignal) -> Result<()> {
        self.write(if signal.is_complete() { "true" } else { "false" })
            .await
    }

    async fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SweepError::io(parent, e))?;
        }
        tokio::fs::write(&self.path, format!("{}\n", value))
            .await
            .map_err(|e| SweepError::io(&self.path, e))
    }
}
