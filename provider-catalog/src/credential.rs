//! Catalog credentials
//!
//! The catalog expects an opaque bearer token on every request. How the token
//! is obtained (OAuth client-credentials exchange, a host login flow) is up to
//! the host; the client only asks a [`CredentialProvider`] for the current
//! token and tells it when the catalog rejected one.

use async_trait::async_trait;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CatalogError, Result};

/// Tokens are refreshed this long before they expire.
const EXPIRY_SKEW_SECONDS: i64 = 30;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token valid for the next request.
    async fn access_token(&self) -> Result<String>;

    /// Forget the current token after the catalog rejected it.
    async fn invalidate(&self);
}

/// A fixed token supplied by configuration.
#[derive(Clone)]
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {
        // A fixed token cannot be renewed; the next call fails the same way.
    }
}

/// Used when no credential is configured; every search fails with `Auth`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingCredential;

#[async_trait]
impl CredentialProvider for MissingCredential {
    async fn access_token(&self) -> Result<String> {
        Err(CatalogError::Auth {
            status: None,
            message: "no catalog credential configured".to_string(),
        })
    }

    async fn invalidate(&self) {}
}

/// A token together with its expiry.
#[derive(Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Host-provided token acquisition.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn issue_token(&self) -> Result<IssuedToken>;
}

/// Caches tokens from a [`TokenSource`] until shortly before they expire.
pub struct CachedCredential<S: TokenSource> {
    source: S,
    clock: Arc<dyn Clock>,
    skew: Duration,
    cached: Mutex<Option<IssuedToken>>,
}

impl<S: TokenSource> CachedCredential<S> {
    pub fn new(source: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            skew: Duration::seconds(EXPIRY_SKEW_SECONDS),
            cached: Mutex::new(None),
        }
    }

    fn is_fresh(&self, token: &IssuedToken) -> bool {
        self.clock.now() + self.skew < token.expires_at
    }
}

#[async_trait]
impl<S: TokenSource> CredentialProvider for CachedCredential<S> {
    async fn access_token(&self) -> Result<String> {
        // Held across the refresh so concurrent callers share one issue call.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| self.is_fresh(token)) {
            return Ok(token.access_token.clone());
        }

        let issued = self.source.issue_token().await.map_err(|e| match e {
            CatalogError::Auth { .. } => e,
            other => CatalogError::Auth {
                status: None,
                message: format!("could not obtain catalog credential: {}", other),
            },
        })?;
        debug!(expires_at = %issued.expires_at, "Issued new catalog token");

        let token = issued.access_token.clone();
        *cached = Some(issued);
        Ok(token)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
