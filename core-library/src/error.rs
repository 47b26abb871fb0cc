use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    /// The settings bridge failed to read or write the library blob.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The remote library endpoint failed or returned an unusable response.
    #[error("Remote library error: {0}")]
    Remote(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl LibraryError {
    pub(crate) fn storage(error: BridgeError) -> Self {
        LibraryError::Storage(error.to_string())
    }

    pub(crate) fn remote(error: BridgeError) -> Self {
        LibraryError::Remote(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
