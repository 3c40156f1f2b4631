//! Repository discovery abstraction layer
//!
//! This module defines the record type returned by a platform's repository
//! list API and the trait the sync engine uses to obtain those records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::platform::PlatformEndpoint;

/// One repository as described by the platform's list API
///
/// Only `name` and `full_name` drive synchronization; the remaining fields are
/// carried through to the metadata dump for operator inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    #[serde(default)]
    pub name: Option<String>,

    /// "owner/name" form
    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,

    #[serde(default)]
    pub clone_url: Option<String>,

    #[serde(default)]
    pub default_branch: Option<String>,

    #[serde(default)]
    pub fork: bool,

    #[serde(default)]
    pub private: bool,

    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RepositoryRecord {
    /// Record with only a name, mostly useful for tests and fixtures
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Local directory segment for this repository
    ///
    /// Uses `name`, falling back to the part of `full_name` after the owner.
    /// Returns `None` when neither yields a usable single path segment.
    pub fn dir_name(&self) -> Option<&str> {
        let candidate = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                let full_name = self.full_name.as_deref()?;
                full_name.split_once('/').map_or(full_name, |(_, repo)| repo).trim()
            }
        };

        let usable = !candidate.is_empty()
            && candidate != "."
            && candidate != ".."
            && !candidate.contains(['/', '\\']);
        usable.then_some(candidate)
    }
}

/// Source of repository records for one platform user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Fetch every repository record, in platform order
    async fn discover(&self, endpoint: &PlatformEndpoint) -> Result<Vec<RepositoryRecord>, FetchError>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}
