use crate::config::Config;
use crate::domain::{Category, Item, Page, RequestKey};
use crate::fetch::{FetchError, RemoteFetcher};
use chrono::NaiveDate;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Default API root used when the config leaves `api_base_url` unset.
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageResponse {
    page: u32,
    total_pages: u32,
    #[serde(default)]
    results: Vec<ItemResponse>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<ItemResponse> for Item {
    fn from(dto: ItemResponse) -> Self {
        let release_date = dto
            .release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        Item {
            id: dto.id,
            title: dto.title.unwrap_or_default(),
            genre: non_empty(dto.genre),
            poster_path: non_empty(dto.poster_path),
            overview: non_empty(dto.overview),
            release_date,
        }
    }
}

impl TryFrom<PageResponse> for Page {
    type Error = FetchError;

    fn try_from(dto: PageResponse) -> Result<Self, Self::Error> {
        if dto.page == 0 {
            return Err(FetchError::Decoding("page number must be 1-based".into()));
        }
        // An empty result set reports total_pages = 0 for page 1
        if dto.total_pages > 0 && dto.page > dto.total_pages {
            return Err(FetchError::Decoding(format!(
                "page {} exceeds total_pages {}",
                dto.page, dto.total_pages
            )));
        }
        Ok(Page::new(
            dto.page,
            dto.total_pages,
            dto.results.into_iter().map(Item::from).collect(),
        ))
    }
}

// ============================================================================
// HTTP fetcher
// ============================================================================

/// Remote fetcher for a TMDB-compatible JSON API.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    language: String,
}

impl HttpFetcher {
    /// Build a fetcher against `base_url`.
    ///
    /// The base URL must be HTTPS; plain HTTP is accepted only for
    /// localhost/127.0.0.1 so tests can point at a mock server.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<SecretString>,
        language: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidRequest(format!("bad base URL: {e}")))?;

        if base_url.scheme() != "https" {
            let is_localhost = matches!(base_url.host_str(), Some("127.0.0.1" | "localhost"));
            if base_url.scheme() != "http" || !is_localhost {
                tracing::error!(base_url = %base_url, "Rejecting non-HTTPS API base URL");
                return Err(FetchError::InvalidRequest(
                    "HTTPS required for API base URL (except localhost)".into(),
                ));
            }
            tracing::warn!(base_url = %base_url, "Using non-HTTPS API base URL (localhost only)");
        }

        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            language: language.into(),
        })
    }

    /// Build a fetcher with its own HTTP client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(concat!("showreel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::new(
            client,
            &config.api_base_url,
            config.api_key(),
            config.language.clone(),
        )
    }

    /// Resolve the endpoint URL for a request key.
    fn endpoint(&self, key: &RequestKey) -> Result<Url, FetchError> {
        if key.page == 0 {
            return Err(FetchError::InvalidRequest("page number must be >= 1".into()));
        }
        let path = match key.category {
            Category::Search => "search/movie",
            Category::Popular => "movie/popular",
            Category::TopRated => "movie/top_rated",
            Category::Upcoming => "movie/upcoming",
        };
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            if key.category.is_search() {
                pairs.append_pair("query", &key.query);
            }
            pairs.append_pair("page", &key.page.to_string());
            pairs.append_pair("language", &self.language);
            if let Some(api_key) = &self.api_key {
                pairs.append_pair("api_key", api_key.expose_secret());
            }
        }
        Ok(url)
    }

    /// Read the response body, enforcing the size limit while streaming.
    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE as u64 {
                return Err(FetchError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
                return Err(FetchError::ResponseTooLarge(MAX_RESPONSE_SIZE));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, key: &RequestKey) -> Result<Page, FetchError> {
        let url = self.endpoint(key)?;
        tracing::debug!(key = %key, path = %url.path(), "Fetching page");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(key = %key, status = status.as_u16(), "Page fetch rejected");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = Self::read_body(response).await?;
        let dto: PageResponse = serde_json::from_slice(&body)?;
        let page = Page::try_from(dto)?;
        tracing::debug!(
            key = %key,
            items = page.len(),
            total_pages = page.total_pages,
            "Page fetched"
        );
        Ok(page)
    }
}
