//! Hosting platforms and their endpoint shapes
//!
//! Each supported platform knows how to build its repository list request,
//! its auth headers and the credentialed clone URL for one repository.
//! Adding a platform means adding a variant here.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported git hosting platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[value(name = "github")]
    GitHub,
    #[value(name = "gitee")]
    Gitee,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GitHub => "github",
            Platform::Gitee => "gitee",
        }
    }

    /// Base URL of the REST API
    pub fn default_api_base(&self) -> &'static str {
        match self {
            Platform::GitHub => "https://api.github.com",
            Platform::Gitee => "https://gitee.com/api/v5",
        }
    }

    /// Host serving git over HTTPS
    pub fn git_host(&self) -> &'static str {
        match self {
            Platform::GitHub => "github.com",
            Platform::Gitee => "gitee.com",
        }
    }

    /// Environment variable consulted when no token is configured
    pub fn token_env_var(&self) -> &'static str {
        match self {
            Platform::GitHub => "GITHUB_TOKEN",
            Platform::Gitee => "GITEE_TOKEN",
        }
    }

    fn accept_header(&self) -> &'static str {
        match self {
            Platform::GitHub => "application/vnd.github.v3+json",
            Platform::Gitee => "application/json",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform bound to one user's credentials
#[derive(Clone)]
pub struct PlatformEndpoint {
    platform: Platform,
    username: String,
    token: String,
    api_base: String,
}

impl PlatformEndpoint {
    pub fn new(platform: Platform, username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            platform,
            username: username.into(),
            token: token.into(),
            api_base: platform.default_api_base().to_string(),
        }
    }

    /// Point list requests at a different API root (enterprise installs, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Repository list endpoint for the configured user
    pub fn list_url(&self) -> String {
        format!("{}/users/{}/repos", self.api_base, self.username)
    }

    /// Query parameters for one page of the list endpoint
    pub fn list_query(&self, page: u32, per_page: usize) -> Vec<(&'static str, String)> {
        let mut query = Vec::with_capacity(3);
        if self.platform == Platform::Gitee {
            query.push(("access_token", self.token.clone()));
        }
        query.push(("per_page", per_page.to_string()));
        query.push(("page", page.to_string()));
        query
    }

    /// Headers sent with every list request
    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("autopull/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(self.platform.accept_header()));

        if self.platform == Platform::GitHub {
            match HeaderValue::from_str(&format!("token {}", self.token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    tracing::warn!("Access token contains characters not allowed in a header");
                }
            }
        }

        headers
    }

    /// Build the request for one page of the repository list
    pub fn list_request(
        &self,
        client: &reqwest::Client,
        page: u32,
        per_page: usize,
    ) -> reqwest::RequestBuilder {
        client
            .get(self.list_url())
            .headers(self.auth_headers())
            .query(&self.list_query(page, per_page))
    }

    /// HTTPS clone URL with embedded credentials
    pub fn clone_url(&self, repo: &str) -> String {
        format!(
            "https://{user}:{token}@{host}/{user}/{repo}.git",
            user = self.username,
            token = self.token,
            host = self.platform.git_host(),
        )
    }

    /// Mask the access token wherever it appears in `text`
    pub fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.token, "***")
        }
    }
}

impl fmt::Debug for PlatformEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformEndpoint")
            .field("platform", &self.platform)
            .field("username", &self.username)
            .field("token", &"***")
            .field("api_base", &self.api_base)
            .finish()
    }
}
