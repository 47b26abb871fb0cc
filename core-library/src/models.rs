//! Domain models for the music library
//!
//! `Track` is the canonical record shared by search results, the library and
//! the playback controller. `Library` is the ordered, id-unique collection the
//! store persists as a single JSON blob.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

use crate::error::{LibraryError, Result};

// =============================================================================
// ID Types
// =============================================================================

/// Stable identity of a track.
///
/// Identifiers come from the catalog (or the blob registry for imported files)
/// and are kept verbatim so they survive a search and a persistence round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TrackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A single piece of content with display metadata.
///
/// A track without `playback_url` is valid but not playable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    /// Display name of all contributors, joined with `", "`
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    // Aliases accept the remote library's song shape (`duration`, `url`, `coverArt`)
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub playback_url: Option<String>,
    #[serde(default, alias = "coverArt", skip_serializing_if = "Option::is_none")]
    pub cover_art_url: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration_seconds: None,
            playback_url: None,
            cover_art_url: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_duration_seconds(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_playback_url(mut self, url: impl Into<String>) -> Self {
        self.playback_url = Some(url.into());
        self
    }

    pub fn with_cover_art_url(mut self, url: impl Into<String>) -> Self {
        self.cover_art_url = Some(url.into());
        self
    }

    /// Whether the track carries a non-blank playback URL.
    pub fn is_playable(&self) -> bool {
        self.playback_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Validate the track before it enters the library
    pub fn validate(&self) -> Result<()> {
        if self.id.is_blank() {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: "Track id cannot be empty".to_string(),
            });
        }

        if let Some(duration) = self.duration_seconds {
            if !duration.is_finite() || duration < 0.0 {
                return Err(LibraryError::InvalidInput {
                    field: "durationSeconds".to_string(),
                    message: format!("Track duration {} must be a non-negative number", duration),
                });
            }
        }

        Ok(())
    }
}

/// Ordered collection of tracks, unique by id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Library {
    tracks: Vec<Track>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from an arbitrary sequence, keeping the first
    /// occurrence of each id.
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut seen = HashSet::new();
        let mut deduplicated = Vec::new();
        for track in tracks {
            if seen.insert(track.id.clone()) {
                deduplicated.push(track);
            } else {
                warn!(track_id = %track.id, "Dropping duplicate track id");
            }
        }
        Self {
            tracks: deduplicated,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| &track.id == id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| &track.id == id)
    }

    /// Append a track unless its id is already present. Returns whether it was inserted.
    pub fn insert(&mut self, track: Track) -> bool {
        if self.contains(&track.id) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    /// Remove a track by id, returning it if present.
    pub fn remove(&mut self, id: &TrackId) -> Option<Track> {
        let index = self.position(id)?;
        Some(self.tracks.remove(index))
    }

    /// Replace the track with the same id in place. Returns the previous value.
    pub fn replace(&mut self, track: Track) -> Option<Track> {
        let index = self.position(&track.id)?;
        Some(std::mem::replace(&mut self.tracks[index], track))
    }

    /// Encode as the persisted blob: a compact JSON array.
    pub fn to_blob(&self) -> Result<String> {
        serde_json::to_string(&self.tracks)
            .map_err(|e| LibraryError::Serialization(e.to_string()))
    }

    /// Decode a persisted blob. Duplicate ids keep their first occurrence.
    pub fn from_blob(blob: &str) -> Result<Self> {
        let tracks: Vec<Track> = serde_json::from_str(blob)
            .map_err(|e| LibraryError::Serialization(e.to_string()))?;
        Ok(Self::from_tracks(tracks))
    }
}

impl<'a> IntoIterator for &'a Library {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> Track {
        Track::new(id, format!("Song {id}"))
            .with_artist("Artist")
            .with_album("Album")
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut library = Library::new();
        assert!(library.insert(sample("1")));
        assert!(!library.insert(sample("1").with_album("Other")));
        assert_eq!(library.len(), 1);
        assert_eq!(library.tracks()[0].album, "Album");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut library = Library::from_tracks([sample("1"), sample("2")]);
        let before = library.clone();
        assert!(library.remove(&TrackId::from("9")).is_none());
        assert_eq!(library, before);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut library = Library::from_tracks([sample("1"), sample("2"), sample("3")]);
        let previous = library.replace(sample("2").with_album("Remastered"));
        assert!(previous.is_some());
        assert_eq!(library.position(&"2".into()), Some(1));
        assert_eq!(library.tracks()[1].album, "Remastered");
        assert!(library.replace(sample("4")).is_none());
    }

    #[test]
    fn test_blob_is_canonical() {
        let blob = r#"[{"id":"1","title":"One","artist":"A, B","album":"X","durationSeconds":215.5,"playbackUrl":"https://cdn.example.com/1.mp3"},{"id":"2","title":"Two","artist":"","album":""}]"#;
        let library = Library::from_blob(blob).unwrap();
        assert_eq!(library.len(), 2);
        assert!(library.tracks()[0].is_playable());
        assert!(!library.tracks()[1].is_playable());
        assert_eq!(library.to_blob().unwrap(), blob);

        let full = Library::from_tracks([Track::new("3", "Three")
            .with_artist("C")
            .with_album("Z")
            .with_duration_seconds(61.25)
            .with_playback_url("https://cdn.example.com/3.mp3")
            .with_cover_art_url("https://cdn.example.com/3.jpg")]);
        let full_blob = full.to_blob().unwrap();
        assert!(full_blob.contains(r#""coverArtUrl":"https://cdn.example.com/3.jpg""#));
        assert_eq!(Library::from_blob(&full_blob).unwrap(), full);
    }

    #[test]
    fn test_blob_tolerates_missing_display_fields() {
        let library = Library::from_blob(r#"[{"id":"7","title":"Seven"}]"#).unwrap();
        assert_eq!(library.tracks()[0].artist, "");
        assert_eq!(library.tracks()[0].duration_seconds, None);
    }

    #[test]
    fn test_blob_with_duplicates_keeps_first() {
        let library =
            Library::from_blob(r#"[{"id":"1","title":"First"},{"id":"1","title":"Second"}]"#)
                .unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.tracks()[0].title, "First");
    }

    #[test]
    fn test_corrupt_blob_is_serialization_error() {
        assert!(matches!(
            Library::from_blob("{not json"),
            Err(LibraryError::Serialization(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(sample("1").validate().is_ok());
        assert!(Track::new("  ", "Blank").validate().is_err());
        assert!(sample("1").with_duration_seconds(-1.0).validate().is_err());
        assert!(!sample("1").with_playback_url("   ").is_playable());
    }
}
