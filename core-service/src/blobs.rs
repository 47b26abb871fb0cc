//! Registry of imported local audio files
//!
//! An imported file lives in memory under a `blob:cadence/<uuid>` URL that is
//! stored as the track's playback URL. Entries are released explicitly once
//! neither the library nor the current track refers to them.

use bridge_traits::playback::AudioSource;
use bytes::Bytes;
use core_library::Track;
use core_playback::{PlaybackError, RemoteSourceResolver, SourceResolver};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

pub const BLOB_URL_PREFIX: &str = "blob:cadence/";

struct BlobEntry {
    data: Bytes,
    mime: Option<String>,
}

/// Handle returned by [`BlobRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    pub id: Uuid,
    pub url: String,
}

#[derive(Default)]
pub struct BlobRegistry {
    entries: RwLock<HashMap<String, BlobEntry>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blob_url(url: &str) -> bool {
        url.starts_with(BLOB_URL_PREFIX)
    }

    /// Keep `data` in memory and return the URL that refers to it.
    pub fn register(&self, file_name: &str, data: Bytes) -> BlobHandle {
        let id = Uuid::new_v4();
        let url = format!("{}{}", BLOB_URL_PREFIX, id);
        let mime = mime_for(file_name).map(str::to_string);
        debug!(%url, bytes = data.len(), "Registered local file");
        self.entries.write().insert(url.clone(), BlobEntry { data, mime });
        BlobHandle { id, url }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.read().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn release(&self, url: &str) -> bool {
        self.entries.write().remove(url).is_some()
    }

    /// Release every entry whose URL is not in `referenced`. Returns how many went.
    pub fn retain_referenced<'a>(&self, referenced: impl IntoIterator<Item = &'a str>) -> usize {
        let keep: HashSet<&str> = referenced.into_iter().collect();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|url, _| keep.contains(url.as_str()));
        let released = before - entries.len();
        if released > 0 {
            debug!(released, "Released unreferenced local files");
        }
        released
    }

    pub fn release_all(&self) -> usize {
        let mut entries = self.entries.write();
        let released = entries.len();
        entries.clear();
        released
    }
}

impl SourceResolver for BlobRegistry {
    fn resolve(&self, track: &Track) -> core_playback::Result<AudioSource> {
        match track.playback_url.as_deref() {
            Some(url) if Self::is_blob_url(url) => {
                let entries = self.entries.read();
                let entry = entries.get(url).ok_or_else(|| {
                    PlaybackError::LoadFailed(format!("local file {} was released", url))
                })?;
                Ok(AudioSource::MemoryBuffer {
                    data: entry.data.clone(),
                    mime: entry.mime.clone(),
                })
            }
            _ => RemoteSourceResolver.resolve(track),
        }
    }
}

fn mime_for(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_blob_and_remote() {
        let registry = BlobRegistry::new();
        let handle = registry.register("Song.MP3", Bytes::from_static(b"ID3"));

        let local = Track::new("l", "Local").with_playback_url(handle.url.clone());
        match registry.resolve(&local).unwrap() {
            AudioSource::MemoryBuffer { data, mime } => {
                assert_eq!(&data[..], b"ID3");
                assert_eq!(mime.as_deref(), Some("audio/mpeg"));
            }
            other => panic!("unexpected source {:?}", other),
        }

        let remote = Track::new("r", "Remote").with_playback_url("https://cdn/r.mp3");
        assert!(registry.resolve(&remote).unwrap().is_remote());
    }

    #[test]
    fn test_released_blob_fails_to_resolve() {
        let registry = BlobRegistry::new();
        let handle = registry.register("a.wav", Bytes::from_static(b"RIFF"));
        assert!(registry.release(&handle.url));

        let track = Track::new("l", "Local").with_playback_url(handle.url);
        assert!(matches!(
            registry.resolve(&track),
            Err(PlaybackError::LoadFailed(_))
        ));
    }

    #[test]
    fn test_retain_referenced() {
        let registry = BlobRegistry::new();
        let keep = registry.register("keep.flac", Bytes::new());
        let drop = registry.register("drop.flac", Bytes::new());

        assert_eq!(registry.retain_referenced([keep.url.as_str()]), 1);
        assert!(registry.contains(&keep.url));
        assert!(!registry.contains(&drop.url));
        assert_eq!(registry.release_all(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("x.ogg"), Some("audio/ogg"));
        assert_eq!(mime_for("noextension"), None);
        assert_eq!(mime_for("notes.txt"), None);
    }
}
