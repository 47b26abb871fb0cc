//! Remote library mirror
//!
//! An optional server-side copy of the library. The local store stays the
//! source of truth: the remote snapshot is only consulted when nothing is
//! stored locally, and adds are pushed after the local write has succeeded.
//! Removals are never mirrored.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::models::{Library, Track};

/// Server-side library endpoint.
#[async_trait]
pub trait RemoteLibrary: Send + Sync {
    /// Fetch the full remote collection.
    async fn fetch_snapshot(&self) -> Result<Library>;

    /// Record one added track remotely.
    async fn push_track(&self, track: &Track) -> Result<()>;
}

/// `RemoteLibrary` over plain HTTP: `GET`/`POST {base_url}/library`.
pub struct HttpRemoteLibrary {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    retry_policy: RetryPolicy,
}

impl HttpRemoteLibrary {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl AsRef<str>) -> Self {
        Self {
            http_client,
            endpoint: format!("{}/library", base_url.as_ref().trim_end_matches('/')),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteLibrary for HttpRemoteLibrary {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_snapshot(&self) -> Result<Library> {
        let request = HttpRequest::get(&self.endpoint).header("Accept", "application/json");
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await
            .map_err(LibraryError::remote)?;

        if !response.is_success() {
            return Err(LibraryError::Remote(format!(
                "GET {} returned HTTP {}",
                self.endpoint, response.status
            )));
        }

        let entries: Vec<serde_json::Value> = response.json().map_err(LibraryError::remote)?;
        let mut tracks = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<Track>(entry) {
                Ok(track) if track.validate().is_ok() => tracks.push(track),
                Ok(track) => warn!(track_id = %track.id, "Skipping invalid remote track"),
                Err(e) => warn!(error = %e, "Skipping undecodable remote track"),
            }
        }

        debug!(count = tracks.len(), "Fetched remote library snapshot");
        Ok(Library::from_tracks(tracks))
    }

    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn push_track(&self, track: &Track) -> Result<()> {
        let request = HttpRequest::post(&self.endpoint)
            .json(track)
            .map_err(LibraryError::remote)?;

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await
            .map_err(LibraryError::remote)?;

        if !response.is_success() {
            return Err(LibraryError::Remote(format!(
                "POST {} returned HTTP {}",
                self.endpoint, response.status
            )));
        }

        debug!("Mirrored track to remote library");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpMethod, HttpResponse};
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> BridgeResult<HttpResponse>;
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot_accepts_song_shape() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Get);
                assert_eq!(req.url, "https://sync.example.com/library");
                Ok(HttpResponse::new(
                    200,
                    r#"[
                        {"id":"1","title":"One","artist":"A","album":"X","duration":200,"url":"https://cdn/1.mp3","coverArt":"https://img/1.jpg"},
                        {"title":"No id"},
                        {"id":"","title":"Blank id"}
                    ]"#,
                ))
            });

        let remote = HttpRemoteLibrary::new(Arc::new(mock_http), "https://sync.example.com/");
        let library = remote.fetch_snapshot().await.unwrap();

        assert_eq!(library.len(), 1);
        let track = &library.tracks()[0];
        assert_eq!(track.duration_seconds, Some(200.0));
        assert_eq!(track.playback_url.as_deref(), Some("https://cdn/1.mp3"));
        assert_eq!(track.cover_art_url.as_deref(), Some("https://img/1.jpg"));
    }

    #[tokio::test]
    async fn test_push_track_posts_json() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Post);
                let body: serde_json::Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
                assert_eq!(body["id"], "42");
                assert_eq!(body["title"], "Answer");
                Ok(HttpResponse::new(201, ""))
            });

        let remote = HttpRemoteLibrary::new(Arc::new(mock_http), "https://sync.example.com");
        remote.push_track(&Track::new("42", "Answer")).await.unwrap();
    }

    #[tokio::test]
    async fn test_push_track_failure_is_remote_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .returning(|_, _| Err(BridgeError::Network("connection refused".into())));

        let remote = HttpRemoteLibrary::new(Arc::new(mock_http), "https://sync.example.com");
        let err = remote.push_track(&Track::new("1", "One")).await.unwrap_err();
        assert!(matches!(err, LibraryError::Remote(_)));
    }

    #[tokio::test]
    async fn test_snapshot_http_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .returning(|_, _| Ok(HttpResponse::new(500, "")));

        let remote = HttpRemoteLibrary::new(Arc::new(mock_http), "https://sync.example.com");
        assert!(matches!(
            remote.fetch_snapshot().await,
            Err(LibraryError::Remote(msg)) if msg.contains("500")
        ));
    }
}
