//! Search behaviour of `CatalogClient` against a mocked HTTP bridge.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use mockall::mock;
use provider_catalog::{
    CatalogClient, CatalogError, CatalogSettings, CredentialProvider, StaticCredential,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> BridgeResult<HttpResponse>;
    }
}

const BASE_URL: &str = "https://api.example.com/v1";

fn static_client(mock_http: MockHttpClient) -> CatalogClient {
    CatalogClient::new(
        Arc::new(mock_http),
        Arc::new(StaticCredential::new("test_token")),
        CatalogSettings::new(BASE_URL),
    )
}

fn respond(status: u16, body: &'static str) -> MockHttpClient {
    let mut mock_http = MockHttpClient::new();
    mock_http
        .expect_execute_with_retry()
        .returning(move |_, _| Ok(HttpResponse::new(status, body)));
    mock_http
}

#[tokio::test]
async fn search_sends_authorized_get() {
    let mut mock_http = MockHttpClient::new();
    mock_http
        .expect_execute_with_retry()
        .times(1)
        .returning(|req, policy| {
            assert_eq!(req.method, HttpMethod::Get);
            assert_eq!(
                req.url,
                "https://api.example.com/v1/search?q=test&type=track&limit=20&offset=0"
            );
            assert_eq!(
                req.headers.get("Authorization").map(String::as_str),
                Some("Bearer test_token")
            );
            assert_eq!(
                req.headers.get("Accept").map(String::as_str),
                Some("application/json")
            );
            assert_eq!(req.timeout, Some(Duration::from_secs(10)));
            assert_eq!(policy.max_attempts, 3);
            Ok(HttpResponse::new(200, r#"{"tracks":{"items":[]}}"#))
        });

    let tracks = static_client(mock_http).search("  test ").await.unwrap();
    assert!(tracks.is_empty());
}

#[tokio::test]
async fn missing_preview_url_leaves_playback_absent() {
    let mock_http = respond(
        200,
        r#"{"tracks":{"items":[{
            "id":"abc",
            "name":"Test Song",
            "artists":[{"name":"First"},{"name":"Second"}],
            "album":{"name":"Test Album","images":[{"url":"https://img/abc.jpg"}]},
            "duration_ms":180000
        }],"total":1,"next":null}}"#,
    );

    let tracks = static_client(mock_http).search("test").await.unwrap();

    assert_eq!(tracks.len(), 1);
    let track = &tracks[0];
    assert_eq!(track.id.as_str(), "abc");
    assert_eq!(track.title, "Test Song");
    assert_eq!(track.artist, "First, Second");
    assert_eq!(track.album, "Test Album");
    assert_eq!(track.duration_seconds, Some(180.0));
    assert_eq!(track.cover_art_url.as_deref(), Some("https://img/abc.jpg"));
    assert_eq!(track.playback_url, None);
    assert!(!track.is_playable());
}

#[tokio::test]
async fn search_page_reports_paging() {
    let mock_http = respond(
        200,
        r#"{"tracks":{"items":[{"id":"1"},{"id":"2"}],"total":10,"next":"https://api.example.com/v1/search?offset=4"}}"#,
    );

    let page = static_client(mock_http).search_page("x", 2).await.unwrap();

    assert_eq!(page.offset, 2);
    assert_eq!(page.total, Some(10));
    assert_eq!(page.next_offset, Some(4));
}

#[tokio::test]
async fn forbidden_is_auth_error_with_status() {
    let err = static_client(respond(403, "forbidden"))
        .search("test")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Auth {
            status: Some(403),
            ..
        }
    ));
}

#[tokio::test]
async fn server_error_is_upstream_with_status() {
    let err = static_client(respond(503, ""))
        .search("test")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(matches!(err, CatalogError::Upstream { .. }));
}

#[tokio::test]
async fn transport_failure_is_network_error() {
    let mut mock_http = MockHttpClient::new();
    mock_http
        .expect_execute_with_retry()
        .returning(|_, _| Err(BridgeError::Network("connection reset".to_string())));

    let err = static_client(mock_http).search("test").await.unwrap_err();
    assert!(matches!(err, CatalogError::Network(msg) if msg.contains("connection reset")));
}

#[tokio::test]
async fn unparsable_body_is_malformed() {
    let err = static_client(respond(200, "<html>oops</html>"))
        .search("test")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::MalformedResponse(_)));

    let err = static_client(respond(200, r#"{"message":"ok"}"#))
        .search("test")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::MalformedResponse(_)));
}

#[derive(Default)]
struct CountingCredential {
    invalidations: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for CountingCredential {
    async fn access_token(&self) -> provider_catalog::Result<String> {
        Ok(format!("token-{}", self.invalidations.load(Ordering::SeqCst)))
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn unauthorized_invalidates_credential() {
    let credential = Arc::new(CountingCredential::default());
    let client = CatalogClient::new(
        Arc::new(respond(401, "expired")),
        credential.clone(),
        CatalogSettings::new(BASE_URL),
    );

    let err = client.search("test").await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(credential.invalidations.load(Ordering::SeqCst), 1);

    // Forbidden does not invalidate
    let client = CatalogClient::new(
        Arc::new(respond(403, "nope")),
        credential.clone(),
        CatalogSettings::new(BASE_URL),
    );
    client.search("test").await.unwrap_err();
    assert_eq!(credential.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn throttle_spaces_requests() {
    let mut mock_http = MockHttpClient::new();
    mock_http
        .expect_execute_with_retry()
        .times(3)
        .returning(|_, _| Ok(HttpResponse::new(200, "[]")));

    let client = CatalogClient::new(
        Arc::new(mock_http),
        Arc::new(StaticCredential::new("t")),
        CatalogSettings::new(BASE_URL).with_min_request_interval(Duration::from_millis(500)),
    );

    let started = tokio::time::Instant::now();
    client.search("a").await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    client.search("b").await.unwrap();
    client.search("c").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn unthrottled_by_default() {
    let client = static_client({
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(2)
            .returning(|_, _| Ok(HttpResponse::new(200, "[]")));
        mock_http
    });

    let started = tokio::time::Instant::now();
    client.search("a").await.unwrap();
    client.search("b").await.unwrap();
    assert_eq!(started.elapsed(), Duration::ZERO);
}
