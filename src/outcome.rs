//! Per-repository outcomes and the persisted failure log

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Why a repository failed to sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The git subprocess exceeded its limit or was killed
    Timeout { timeout_ms: u64 },
    /// Any other subprocess failure, with its error text
    Error { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout { timeout_ms } => write!(f, "Timed out after {}ms", timeout_ms),
            FailureReason::Error { message } => f.write_str(message),
        }
    }
}

/// Terminal state of one sync task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Updated,
    Cloned,
    Failed { reason: FailureReason },
}

/// Result of synchronizing one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub repository: String,
    #[serde(flatten)]
    pub status: TaskStatus,
}

impl TaskOutcome {
    pub fn updated(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            status: TaskStatus::Updated,
        }
    }

    pub fn cloned(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            status: TaskStatus::Cloned,
        }
    }

    pub fn failed(repository: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            repository: repository.into(),
            status: TaskStatus::Failed { reason },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, TaskStatus::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.status {
            TaskStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Failed outcomes of one run, in repository order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureLog {
    pub generated_at: DateTime<Utc>,
    pub failures: Vec<TaskOutcome>,
}

impl FailureLog {
    /// Keep only the failed outcomes
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a TaskOutcome>) -> Self {
        Self {
            generated_at: Utc::now(),
            failures: outcomes
                .into_iter()
                .filter(|outcome| outcome.is_failure())
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Write the log as pretty-printed JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize failure log")?;

        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write failure log: {:?}", path))?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read failure log: {:?}", path))?;

        serde_json::from_str(&content).with_context(|| format!("Failed to parse failure log: {:?}", path))
    }
}
