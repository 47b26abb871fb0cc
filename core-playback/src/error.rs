//! # Playback Error Types
//!
//! Errors raised by the playback controller. They are recorded as
//! `PlaybackState::last_error` and never affect unrelated tracks.

use core_library::TrackId;
use thiserror::Error;

use crate::state::PlaybackStatus;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The track has no playback URL.
    #[error("Track is not playable: {0}")]
    NotPlayable(TrackId),

    /// The source could not be resolved or the device refused to load it.
    #[error("Failed to load track: {0}")]
    LoadFailed(String),

    /// The audio device failed while executing a command or playing.
    #[error("Audio device error: {0}")]
    DeviceError(String),

    /// The command is not valid in the current state.
    #[error("Cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: PlaybackStatus,
    },

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,
}

impl PlaybackError {
    /// Returns `true` if the failure came from the device or the source.
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            PlaybackError::LoadFailed(_) | PlaybackError::DeviceError(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
