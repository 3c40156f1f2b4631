//! Common test utilities and helpers for autopull tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

use autopull::{
    Discovery, FetchError, GitError, GitOps, Platform, PlatformEndpoint, RepositoryRecord,
    SyncConfig,
};

/// Temp clone directory plus saved token environment
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub original_env: Vec<(String, Option<String>)>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        // Store original environment variables
        let env_vars = ["GITHUB_TOKEN", "GITEE_TOKEN", "XDG_CONFIG_HOME"];
        let original_env = env_vars
            .iter()
            .map(|var| (var.to_string(), env::var(var).ok()))
            .collect();

        Self {
            temp_dir,
            original_env,
        }
    }

    pub fn clear_tokens(&self) {
        env::remove_var("GITHUB_TOKEN");
        env::remove_var("GITEE_TOKEN");
    }

    pub fn clone_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// `{clone_dir}/{username}`
    pub fn destination(&self, username: &str) -> PathBuf {
        self.temp_dir.path().join(username)
    }

    pub fn sync_config(&self, platform: Platform, concurrency: usize, timeout_ms: u64) -> SyncConfig {
        SyncConfig {
            username: "octocat".to_string(),
            token: Some("test-token".to_string()),
            platform: Some(platform),
            clone_dir: self.temp_dir.path().to_string_lossy().into_owned(),
            concurrency,
            timeout_ms,
            api_base_url: None,
        }
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        // Restore original environment variables
        for (key, value) in &self.original_env {
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

pub fn records(names: &[&str]) -> Vec<RepositoryRecord> {
    names.iter().map(|name| RepositoryRecord::named(*name)).collect()
}

/// JSON body for one page of the list API
pub fn page_json(owner: &str, range: std::ops::Range<usize>) -> serde_json::Value {
    let items: Vec<serde_json::Value> = range
        .map(|i| {
            serde_json::json!({
                "name": format!("repo-{:03}", i),
                "full_name": format!("{}/repo-{:03}", owner, i),
                "private": false,
                "fork": false,
                "default_branch": "main",
            })
        })
        .collect();
    serde_json::Value::Array(items)
}

/// Discovery returning a fixed list and counting calls
pub struct StaticDiscovery {
    records: Vec<RepositoryRecord>,
    pub calls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new(records: Vec<RepositoryRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self, _endpoint: &PlatformEndpoint) -> Result<Vec<RepositoryRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

/// Which operation FakeGit saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Clone { url: String, target: PathBuf },
    Pull { repo_dir: PathBuf },
}

/// GitOps that sleeps instead of running git, honoring the limit like the real one
#[derive(Default)]
pub struct FakeGit {
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<GitCall>>,
}

impl FakeGit {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            ..Default::default()
        }
    }

    /// Delay for the repository whose directory or URL mentions `repo`
    pub fn with_delay(mut self, repo: &str, delay: Duration) -> Self {
        self.delays.insert(repo.to_string(), delay);
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn delay_for(&self, path: &Path) -> Duration {
        path.file_name()
            .and_then(|name| self.delays.get(name.to_string_lossy().as_ref()))
            .copied()
            .unwrap_or(self.default_delay)
    }

    async fn simulate(&self, path: &Path, limit: Duration) -> Result<(), GitError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = tokio::time::timeout(limit, tokio::time::sleep(self.delay_for(path)))
            .await
            .map_err(|_| GitError::TimedOut(limit));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl GitOps for FakeGit {
    async fn clone_repo(&self, url: &str, target: &Path, limit: Duration) -> Result<(), GitError> {
        self.calls.lock().expect("calls lock").push(GitCall::Clone {
            url: url.to_string(),
            target: target.to_path_buf(),
        });
        self.simulate(target, limit).await?;
        std::fs::create_dir_all(target).map_err(GitError::Spawn)
    }

    async fn pull(&self, repo_dir: &Path, limit: Duration) -> Result<(), GitError> {
        self.calls.lock().expect("calls lock").push(GitCall::Pull {
            repo_dir: repo_dir.to_path_buf(),
        });
        self.simulate(repo_dir, limit).await
    }
}
