//! Mapping tracks to device sources

use bridge_traits::playback::AudioSource;
use core_library::Track;

use crate::error::{PlaybackError, Result};

/// Turns a track's playback URL into something the device can load.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, track: &Track) -> Result<AudioSource>;
}

/// Hands every URL to the device as a remote stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteSourceResolver;

impl SourceResolver for RemoteSourceResolver {
    fn resolve(&self, track: &Track) -> Result<AudioSource> {
        match track.playback_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(AudioSource::remote(url)),
            _ => Err(PlaybackError::NotPlayable(track.id.clone())),
        }
    }
}
