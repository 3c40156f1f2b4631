use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::error::GitError;

/// The two git operations a sync task can issue
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitOps: Send + Sync {
    /// `git clone <url> <target>`
    async fn clone_repo(&self, url: &str, target: &Path, limit: Duration) -> Result<(), GitError>;

    /// `git pull` inside `repo_dir`
    async fn pull(&self, repo_dir: &Path, limit: Duration) -> Result<(), GitError>;
}

/// Runs the system `git` executable
#[derive(Debug, Clone, Default)]
pub struct GitClient;

impl GitClient {
    pub fn new() -> Self {
        Self
    }

    fn git() -> AsyncCommand {
        let mut command = AsyncCommand::new("git");
        // Never block on an interactive credential prompt
        command.env("GIT_TERMINAL_PROMPT", "0");
        command
    }
}

#[async_trait]
impl GitOps for GitClient {
    async fn clone_repo(&self, url: &str, target: &Path, limit: Duration) -> Result<(), GitError> {
        debug!("Cloning into {}", target.display());

        let mut command = Self::git();
        command.arg("clone").arg(url).arg(target);
        run_with_timeout(command, limit).await.map(|_| ())
    }

    async fn pull(&self, repo_dir: &Path, limit: Duration) -> Result<(), GitError> {
        debug!("Pulling in {}", repo_dir.display());

        let mut command = Self::git();
        command.arg("pull").current_dir(repo_dir);
        run_with_timeout(command, limit).await.map(|_| ())
    }
}

/// Run a subprocess to completion, killing it if `limit` elapses first
pub async fn run_with_timeout(mut command: AsyncCommand, limit: Duration) -> Result<Output, GitError> {
    command.stdin(Stdio::null()).kill_on_drop(true);

    // Dropping the output future on timeout drops the child, which kills it.
    let output = match timeout(limit, command.output()).await {
        Err(_elapsed) => return Err(GitError::TimedOut(limit)),
        Ok(result) => result.map_err(GitError::Spawn)?,
    };

    if output.status.success() {
        return Ok(output);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = output.status.signal() {
            return Err(GitError::Terminated(signal));
        }
    }

    Err(GitError::Exited {
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Instant;

    fn shell(script: &str) -> AsyncCommand {
        let mut command = AsyncCommand::new("sh");
        command.arg("-c").arg(script);
        command
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out_and_is_killed() {
        let started = Instant::now();
        let result = run_with_timeout(shell("sleep 5"), Duration::from_millis(100)).await;

        assert_matches!(result, Err(GitError::TimedOut(limit)) if limit == Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        let result = run_with_timeout(shell("echo 'fatal: nope' >&2; exit 3"), Duration::from_secs(5)).await;

        match result {
            Err(GitError::Exited { status, stderr }) => {
                assert!(status.contains('3'));
                assert_eq!(stderr, "fatal: nope");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signalled_command_counts_as_terminated() {
        let result = run_with_timeout(shell("kill -9 $$"), Duration::from_secs(5)).await;
        assert_matches!(result, Err(GitError::Terminated(9)));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let command = AsyncCommand::new("autopull-definitely-not-a-real-binary");
        let result = run_with_timeout(command, Duration::from_secs(1)).await;
        assert_matches!(result, Err(GitError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_clone_and_pull_local_repository() {
        if !git_available() {
            return;
        }

        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let origin = temp.path().join("origin");
        std::fs::create_dir_all(&origin).unwrap();

        let setup = std::process::Command::new("sh")
            .arg("-c")
            .arg(
                "git init -q && git -c user.name=t -c user.email=t@example.com \
                 commit -q --allow-empty -m init",
            )
            .current_dir(&origin)
            .status()
            .unwrap();
        assert!(setup.success());

        let client = GitClient::new();
        let target = temp.path().join("clone");
        let limit = Duration::from_secs(30);

        client
            .clone_repo(origin.to_str().unwrap(), &target, limit)
            .await
            .expect("clone should succeed");
        assert!(target.join(".git").exists());

        client.pull(&target, limit).await.expect("pull should succeed");
    }

    #[tokio::test]
    async fn test_clone_of_missing_source_fails_without_timeout() {
        if !git_available() {
            return;
        }

        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let result = GitClient::new()
            .clone_repo(
                temp.path().join("missing").to_str().unwrap(),
                &temp.path().join("clone"),
                Duration::from_secs(30),
            )
            .await;

        let err = result.expect_err("clone of a missing path must fail");
        assert!(!err.is_timeout());
        assert_matches!(err, GitError::Exited { .. });
    }
}
