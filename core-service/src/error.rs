use core_library::{LibraryError, TrackId};
use core_playback::PlaybackError;
use provider_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] core_runtime::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// The id is neither in the library nor in the current search results.
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),
}

/// Caller-facing classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Upstream(u16),
    MalformedResponse,
    Auth,
    Storage,
    Playback,
    /// Only raised while building the service.
    Configuration,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Configuration(_) => ErrorKind::Configuration,
            CoreError::Catalog(error) => match error {
                CatalogError::Network(_) => ErrorKind::Network,
                CatalogError::Upstream { status, .. } => ErrorKind::Upstream(*status),
                CatalogError::MalformedResponse(_) => ErrorKind::MalformedResponse,
                CatalogError::Auth { .. } => ErrorKind::Auth,
            },
            CoreError::Library(error) => match error {
                LibraryError::Remote(_) => ErrorKind::Network,
                LibraryError::Storage(_)
                | LibraryError::Serialization(_)
                | LibraryError::InvalidInput { .. } => ErrorKind::Storage,
            },
            CoreError::Playback(_) | CoreError::TrackNotFound(_) => ErrorKind::Playback,
        }
    }

    /// Everything except start-up configuration errors leaves prior state intact.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Configuration
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
