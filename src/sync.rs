//! Sync Engine - Orchestrates repository synchronization
//!
//! A run has two phases. `fetching` validates the configuration, resolves the
//! credential and lists every repository; any failure there aborts the run.
//! `syncing` clones or pulls each repository through the bounded pool; failures
//! there are recorded per repository and never abort the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::discovery::{Discovery, RepositoryRecord};
use crate::error::SyncError;
use crate::fetcher::PageFetcher;
use crate::git::{GitClient, GitOps};
use crate::outcome::{FailureLog, FailureReason, TaskOutcome, TaskStatus};
use crate::platform::PlatformEndpoint;
use crate::pool::run_bounded;
use crate::task::SyncTaskBuilder;

/// Diagnostic dump of every fetched record, under the destination root
pub const METADATA_FILE: &str = "repos_metadata.json";

/// Failure log, under the destination root, written only when something failed
pub const FAILURE_LOG_FILE: &str = "failed_repos.json";

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub updated: usize,
    pub cloned: usize,
    pub failed: usize,
    pub duration: Duration,
    pub outcomes: Vec<TaskOutcome>,
    pub destination: PathBuf,
    /// Where the failure log was written, if it was
    pub failure_log: Option<PathBuf>,
}

impl SyncSummary {
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    pub fn successful(&self) -> usize {
        self.updated + self.cloned
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// The main sync engine that orchestrates repository synchronization
#[derive(Clone)]
pub struct SyncEngine {
    discovery: Arc<dyn Discovery>,
    git: Arc<dyn GitOps>,
}

impl SyncEngine {
    pub fn new(discovery: Arc<dyn Discovery>, git: Arc<dyn GitOps>) -> Self {
        Self { discovery, git }
    }

    /// Engine backed by the HTTP page fetcher and the system `git`
    pub fn with_defaults() -> Result<Self, SyncError> {
        let fetcher = PageFetcher::new()?;
        Ok(Self::new(Arc::new(fetcher), Arc::new(GitClient::new())))
    }

    /// Run a complete sync operation: discover repositories and sync them
    pub async fn run(&self, config: &SyncConfig) -> Result<SyncSummary, SyncError> {
        let start_time = Instant::now();

        let platform = config.validate()?;
        let token = config.resolve_token(platform)?;

        let destination = config.destination_root();
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|source| SyncError::Destination {
                path: destination.clone(),
                source,
            })?;

        let mut endpoint = PlatformEndpoint::new(platform, config.username.clone(), token);
        if let Some(api_base) = &config.api_base_url {
            endpoint = endpoint.with_api_base(api_base.clone());
        }
        let endpoint = Arc::new(endpoint);

        info!(
            "Fetching repositories for {} from {} via {}",
            config.username,
            platform,
            self.discovery.provider_name()
        );
        let records = self.discovery.discover(&endpoint).await?;

        println!("\nFound {} repositories on {}", records.len(), platform);
        println!("Syncing to: {}\n", destination.display());

        write_metadata(&destination, &records).await;

        let builder = SyncTaskBuilder::new(&destination, endpoint, self.git.clone(), config.timeout());
        let outcomes = self.sync_records(&builder, &records, config.concurrency).await;

        let summary = self
            .compile_summary(outcomes, destination, start_time.elapsed())
            .await;

        info!(
            "Sync completed in {:.2}s: {} updated, {} cloned, {} failed",
            summary.duration.as_secs_f64(),
            summary.updated,
            summary.cloned,
            summary.failed
        );

        Ok(summary)
    }

    /// Build one task per usable record and drive them through the pool
    async fn sync_records(
        &self,
        builder: &SyncTaskBuilder,
        records: &[RepositoryRecord],
        concurrency: usize,
    ) -> Vec<TaskOutcome> {
        let usable: Vec<&RepositoryRecord> = records
            .iter()
            .filter(|record| {
                let ok = record.dir_name().is_some();
                if !ok {
                    warn!("Skipping repository record without a usable name: {:?}", record);
                }
                ok
            })
            .collect();

        let total = usable.len();
        let tasks: Vec<_> = usable
            .iter()
            .enumerate()
            .filter_map(|(i, record)| builder.build(record, i + 1, total))
            .collect();
        let names: Vec<String> = tasks.iter().map(|task| task.name().to_string()).collect();

        debug!("Syncing {} repositories with concurrency {}", total, concurrency);

        let jobs = tasks.into_iter().map(|task| task.into_job()).collect();
        let settled = run_bounded(jobs, concurrency).await;

        settled
            .into_iter()
            .zip(names)
            .map(|(result, name)| match result {
                Ok(outcome) => outcome,
                Err(failure) => {
                    error!("Sync task for {} did not settle normally: {}", name, failure);
                    TaskOutcome::failed(
                        name,
                        FailureReason::Error {
                            message: failure.to_string(),
                        },
                    )
                }
            })
            .collect()
    }

    /// Tally outcomes and persist the failure log when needed
    async fn compile_summary(
        &self,
        outcomes: Vec<TaskOutcome>,
        destination: PathBuf,
        duration: Duration,
    ) -> SyncSummary {
        let mut updated = 0;
        let mut cloned = 0;
        let mut failed = 0;

        for outcome in &outcomes {
            match outcome.status {
                TaskStatus::Updated => updated += 1,
                TaskStatus::Cloned => cloned += 1,
                TaskStatus::Failed { .. } => failed += 1,
            }
        }

        let failure_log = if failed > 0 {
            let path = destination.join(FAILURE_LOG_FILE);
            match FailureLog::from_outcomes(&outcomes).save(&path).await {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!("Could not write failure log: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        SyncSummary {
            total_repositories: outcomes.len(),
            updated,
            cloned,
            failed,
            duration,
            outcomes,
            destination,
            failure_log,
        }
    }
}

/// Best-effort dump of the fetched records for operator inspection
async fn write_metadata(destination: &Path, records: &[RepositoryRecord]) {
    let path = destination.join(METADATA_FILE);

    let json = match serde_json::to_string_pretty(records) {
        Ok(json) => json,
        Err(e) => {
            warn!("Could not serialize repository metadata: {}", e);
            return;
        }
    };

    match tokio::fs::write(&path, json).await {
        Ok(()) => debug!("Wrote repository metadata to {}", path.display()),
        Err(e) => warn!("Could not write repository metadata to {}: {}", path.display(), e),
    }
}
