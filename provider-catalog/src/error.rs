//! Error types for the catalog provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Catalog search errors
///
/// All variants are recoverable at the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No response was received: DNS, connection reset, timeout
    #[error("Network error: {0}")]
    Network(String),

    /// The catalog answered with a non-success status
    #[error("Catalog API error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    /// The body is not JSON or holds no recognisable track collection
    #[error("Malformed catalog response: {0}")]
    MalformedResponse(String),

    /// The credential was rejected (401/403) or could not be obtained (`status` is `None`)
    #[error("Authentication failed: {message}")]
    Auth { status: Option<u16>, message: String },
}

impl CatalogError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Upstream { status, .. } => Some(*status),
            CatalogError::Auth { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, CatalogError::Auth { .. })
    }

    /// Classify a non-success HTTP status.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        let message = summarize_body(body);
        match status {
            401 | 403 => CatalogError::Auth {
                status: Some(status),
                message,
            },
            _ => CatalogError::Upstream { status, message },
        }
    }
}

impl From<BridgeError> for CatalogError {
    fn from(error: BridgeError) -> Self {
        // Anything the HTTP bridge reports happened before a response arrived.
        CatalogError::Network(error.to_string())
    }
}

/// First line of an error body, bounded for log and display use.
fn summarize_body(body: &[u8]) -> String {
    const MAX_LEN: usize = 200;
    let text = String::from_utf8_lossy(body);
    let line = text.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return "empty response body".to_string();
    }
    line.chars().take(MAX_LEN).collect()
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
