//! autopull - Batch clone and update for every repository of a user
//!
//! autopull lists all repositories a user owns on a hosted git platform and
//! keeps a local mirror of them, cloning what is missing and pulling what is
//! already there, with a bounded number of git processes in flight.
//!
//! ## Core Features
//!
//! - **Platforms**: GitHub and Gitee, paginated over their REST list APIs
//! - **Bounded Concurrency**: cooperative worker pool with per-task isolation
//! - **Per-task Timeouts**: git subprocesses are killed when they overrun
//! - **Failure Log**: failed repositories are persisted as JSON after each run
//! - **Cleanup Helpers**: pattern-based file deletion and empty-dir pruning
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`fetcher`]: Paginated repository listing
//! - [`pool`]: Bounded task execution
//! - [`sync`]: The end-to-end sync engine

pub mod cleanup;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod git;
pub mod outcome;
pub mod platform;
pub mod pool;
pub mod sync;
pub mod task;

pub use config::{Config, SyncConfig};
pub use discovery::{Discovery, RepositoryRecord};
pub use error::{FetchError, GitError, SyncError};
pub use fetcher::PageFetcher;
pub use git::{GitClient, GitOps};
pub use outcome::{FailureLog, FailureReason, TaskOutcome, TaskStatus};
pub use platform::{Platform, PlatformEndpoint};
pub use sync::{SyncEngine, SyncSummary};
