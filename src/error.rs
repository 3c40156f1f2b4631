//! Error taxonomy for a sync run.
//!
//! Fatal errors ([`SyncError`]) stop the run before or during repository
//! discovery. Per-repository errors ([`GitError`]) never leave the task that
//! produced them.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort an entire sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or incomplete configuration, raised before any network activity.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The destination root could not be created.
    #[error("Failed to create destination directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Repository discovery failed; nothing was synced.
    #[error("Failed to fetch repositories: {0}")]
    Fetch(#[from] FetchError),
}

impl SyncError {
    /// Create a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Errors raised while paging through a platform's repository list.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client itself could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport-level failure (DNS, connect, TLS, ...).
    #[error("request for page {page} failed: {source}")]
    Request {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The platform answered with a non-2xx status.
    #[error("page {page} returned HTTP {status}: {body}")]
    Status { page: u32, status: u16, body: String },

    /// The response body was not a JSON list of repositories.
    #[error("page {page} could not be decoded: {source}")]
    Decode {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Every page up to the cap came back full, so the listing never ended.
    #[error("repository listing did not end within {limit} pages of {per_page}")]
    TooManyPages { limit: u32, per_page: usize },
}

impl FetchError {
    /// Page number the failure happened on, if any.
    pub fn page(&self) -> Option<u32> {
        match self {
            FetchError::Client(_) => None,
            FetchError::Request { page, .. }
            | FetchError::Status { page, .. }
            | FetchError::Decode { page, .. } => Some(*page),
            FetchError::TooManyPages { limit, .. } => Some(*limit),
        }
    }
}

/// Structured result of a failed `git` subprocess.
#[derive(Debug, Error)]
pub enum GitError {
    /// The process could not be started at all.
    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),

    /// The wall-clock limit elapsed and the child was killed.
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The child was killed by a signal it did not handle.
    #[error("terminated by signal {0}")]
    Terminated(i32),

    /// The child ran to completion with a failing exit status.
    #[error("git exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },
}

impl GitError {
    /// Whether this failure counts as a timeout rather than a generic error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitError::TimedOut(_) | GitError::Terminated(_))
    }
}
