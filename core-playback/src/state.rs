//! Playback state snapshot

use core_library::TrackId;
use serde::Serialize;
use std::fmt;

use crate::error::PlaybackError;

/// Transport status of the single audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Errored,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Errored => "errored",
        }
    }

    /// Whether a source is loaded and can be paused, resumed or seeked.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state of the audio session.
///
/// `current_track_id` is a weak reference: the track may have been removed
/// from the library since it was started.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_track_id: Option<TrackId>,
    /// True only while the device reports an active play state
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    /// Stored level in `0.0..=1.0`, kept while muted
    pub volume: f32,
    pub muted: bool,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<PlaybackError>,
}

impl PlaybackState {
    pub fn new(volume: f32) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_track_id: None,
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: None,
            volume: volume.clamp(0.0, 1.0),
            muted: false,
            last_error: None,
        }
    }

    /// Volume actually audible on the device.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<PlaybackError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_volume() {
        assert_eq!(PlaybackState::new(1.7).volume, 1.0);
        assert_eq!(PlaybackState::new(-0.2).volume, 0.0);
    }

    #[test]
    fn test_effective_volume_when_muted() {
        let mut state = PlaybackState::new(0.4);
        state.muted = true;
        assert_eq!(state.effective_volume(), 0.0);
        assert_eq!(state.volume, 0.4);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut state = PlaybackState::new(0.5);
        state.last_error = Some(PlaybackError::NoTrackLoaded);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["isPlaying"], false);
        assert_eq!(json["lastError"], "No track loaded");
    }
}
