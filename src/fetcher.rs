use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::discovery::{Discovery, RepositoryRecord};
use crate::error::FetchError;
use crate::platform::PlatformEndpoint;

/// Records requested per page; a shorter page marks the end of the list
pub const PAGE_SIZE: usize = 100;

/// Default cap on pages fetched for one user
pub const MAX_PAGES: u32 = 255;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Paginating client for a platform's repository list endpoint
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    max_pages: u32,
}

impl PageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self::with_client(client))
    }

    /// Reuse an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_pages: MAX_PAGES,
        }
    }

    /// Fail instead of requesting more than `max_pages` pages
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Fetch one page of repository records
    pub async fn fetch_page(
        &self,
        endpoint: &PlatformEndpoint,
        page: u32,
    ) -> Result<Vec<RepositoryRecord>, FetchError> {
        debug!("Fetching {} repositories page {}", endpoint.platform(), page);

        let response = endpoint
            .list_request(&self.client, page, PAGE_SIZE)
            .send()
            .await
            .map_err(|source| FetchError::Request { page, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
                body: endpoint.redact(body.trim()),
            });
        }

        response
            .json::<Vec<RepositoryRecord>>()
            .await
            .map_err(|source| FetchError::Decode { page, source })
    }

    /// Fetch every page, stopping at the first short or empty one
    pub async fn fetch_all(
        &self,
        endpoint: &PlatformEndpoint,
    ) -> Result<Vec<RepositoryRecord>, FetchError> {
        let mut repositories = Vec::new();
        let mut page = 1u32;

        loop {
            let items = self.fetch_page(endpoint, page).await?;
            let count = items.len();
            repositories.extend(items);

            if count < PAGE_SIZE {
                break;
            }
            if page >= self.max_pages {
                warn!(
                    "Stopping after {} full pages for {}; the API may be ignoring the page parameter",
                    page,
                    endpoint.username()
                );
                return Err(FetchError::TooManyPages {
                    limit: self.max_pages,
                    per_page: PAGE_SIZE,
                });
            }
            page += 1;
        }

        info!(
            "Found {} repositories for {} on {} ({} pages)",
            repositories.len(),
            endpoint.username(),
            endpoint.platform(),
            page
        );
        Ok(repositories)
    }
}

#[async_trait]
impl Discovery for PageFetcher {
    async fn discover(&self, endpoint: &PlatformEndpoint) -> Result<Vec<RepositoryRecord>, FetchError> {
        self.fetch_all(endpoint).await
    }

    fn provider_name(&self) -> &'static str {
        "REST list API"
    }
}
