//! Catalog search client

use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use core_library::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::credential::CredentialProvider;
use crate::error::{CatalogError, Result};
use crate::types::{parse_search_page, SearchPage};

/// Default number of results requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Connection settings for [`CatalogClient`].
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
    pub page_size: u32,
    /// Minimum spacing between two requests; zero disables throttling
    pub min_request_interval: Duration,
    pub request_timeout: Duration,
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Drop tracks without a playback URL from results
    pub filter_unplayable: bool,
}

impl CatalogSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
            min_request_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            filter_unplayable: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_filter_unplayable(mut self, enabled: bool) -> Self {
        self.filter_unplayable = enabled;
        self
    }
}

/// Catalog API client
///
/// Translates free-text queries into catalog search requests and the
/// responses into [`Track`]s. It never touches the library or playback
/// state.
///
/// # Features
///
/// - Blank queries short-circuit to an empty result without a request
/// - Optional minimum interval between requests (delayed, never rejected)
/// - Retries of 429/5xx through the HTTP bridge's retry policy
/// - Credential invalidation when the catalog answers 401
///
/// # Example
///
/// ```ignore
/// use provider_catalog::{CatalogClient, CatalogSettings, StaticCredential};
///
/// let client = CatalogClient::new(
///     http_client,
///     Arc::new(StaticCredential::new(token)),
///     CatalogSettings::new("https://api.example.com/v1"),
/// );
/// let tracks = client.search("daft punk").await?;
/// ```
pub struct CatalogClient {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialProvider>,
    settings: CatalogSettings,
    /// When the previous request was sent; owned per instance
    last_request_at: Mutex<Option<Instant>>,
}

impl CatalogClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialProvider>,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            http_client,
            credentials,
            settings,
            last_request_at: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Search the first page of tracks matching `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        Ok(self.search_page(query, 0).await?.tracks)
    }

    /// Search one page of tracks starting at `offset`.
    #[instrument(skip(self, query), fields(query = %query.trim()))]
    pub async fn search_page(&self, query: &str, offset: u32) -> Result<SearchPage> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Blank query, skipping request");
            return Ok(SearchPage::empty(offset));
        }

        self.throttle().await;

        let token = self.credentials.access_token().await.map_err(|e| match e {
            CatalogError::Auth { .. } => e,
            other => CatalogError::Auth {
                status: None,
                message: other.to_string(),
            },
        })?;

        let url = self.search_url(query, offset);
        let request = HttpRequest::get(url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(self.settings.request_timeout);

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy())
            .await
            .map_err(|e| {
                warn!(error = %e, "Catalog request failed before a response");
                CatalogError::from(e)
            })?;

        if !response.is_success() {
            let error = CatalogError::from_status(response.status, &response.body);
            warn!(status = response.status, "Catalog returned an error status");
            if response.status == 401 {
                self.credentials.invalidate().await;
            }
            return Err(error);
        }

        let body: serde_json::Value = serde_json::from_slice(&response.body).map_err(|e| {
            CatalogError::MalformedResponse(format!("response is not JSON: {}", e))
        })?;

        let mut page = parse_search_page(&body, offset)?;
        if self.settings.filter_unplayable {
            let before = page.tracks.len();
            page.tracks.retain(Track::is_playable);
            debug!(dropped = before - page.tracks.len(), "Filtered unplayable tracks");
        }

        info!(
            result_count = page.tracks.len(),
            total = ?page.total,
            "Catalog search completed"
        );
        Ok(page)
    }

    fn search_url(&self, query: &str, offset: u32) -> String {
        format!(
            "{}/search?q={}&type=track&limit={}&offset={}",
            self.settings.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.settings.page_size,
            offset
        )
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.settings.max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    /// Wait until the minimum interval since the previous request has passed.
    async fn throttle(&self) {
        let interval = self.settings.min_request_interval;
        if interval.is_zero() {
            return;
        }

        // Held while sleeping so queued searches are spaced one by one.
        let mut last = self.last_request_at.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(wait_ms = (ready_at - now).as_millis() as u64, "Throttling catalog request");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticCredential;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> BridgeResult<HttpResponse>;
        }
    }

    fn client(mock_http: MockHttpClient, settings: CatalogSettings) -> CatalogClient {
        CatalogClient::new(
            Arc::new(mock_http),
            Arc::new(StaticCredential::new("test_token")),
            settings,
        )
    }

    #[test]
    fn test_search_url_encodes_query() {
        let client = client(
            MockHttpClient::new(),
            CatalogSettings::new("https://api.example.com/v1/").with_page_size(5),
        );
        assert_eq!(
            client.search_url("AC/DC & friends", 10),
            "https://api.example.com/v1/search?q=AC%2FDC%20%26%20friends&type=track&limit=5&offset=10"
        );
    }

    #[test]
    fn test_retry_policy_uses_max_attempts() {
        let client = client(
            MockHttpClient::new(),
            CatalogSettings::new("https://api.example.com").with_max_attempts(0),
        );
        assert_eq!(client.retry_policy().max_attempts, 1);
    }

    #[tokio::test]
    async fn test_blank_query_sends_nothing() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute_with_retry().never();

        let client = client(mock_http, CatalogSettings::new("https://api.example.com"));
        assert!(client.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_unplayable_when_enabled() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute_with_retry().returning(|_, _| {
            Ok(HttpResponse::new(
                200,
                r#"[{"id":"1","title":"Playable","url":"https://cdn/1.mp3"},{"id":"2","title":"Silent"}]"#,
            ))
        });

        let client = client(
            mock_http,
            CatalogSettings::new("https://api.example.com").with_filter_unplayable(true),
        );
        let tracks = client.search("x").await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id.as_str(), "1");
    }
}
