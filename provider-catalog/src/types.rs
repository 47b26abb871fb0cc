//! Catalog response normalisation
//!
//! The upstream format is not under our control and has shipped in several
//! shapes. Parsing is done over `serde_json::Value` so that a missing or
//! oddly typed optional field never fails the whole search:
//!
//! 1. `{"tracks": {"items": [...], "total": n, "next": url|null}}`
//! 2. `{"items" | "results" | "data" | "songs": [...]}`
//! 3. a bare array of entries

use core_library::Track;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{CatalogError, Result};

/// Title used when an entry carries none
pub const UNTITLED: &str = "Untitled";

const COLLECTION_KEYS: [&str; 4] = ["items", "results", "data", "songs"];
const PLAYBACK_URL_KEYS: [&str; 4] = ["preview_url", "playbackUrl", "url", "stream_url"];
const COVER_ART_KEYS: [&str; 3] = ["coverArtUrl", "coverArt", "image"];

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub tracks: Vec<Track>,
    /// Offset this page was requested at
    pub offset: u32,
    /// Total number of matches, when the upstream reports it
    pub total: Option<u32>,
    /// Offset of the following page, `None` on the last page
    pub next_offset: Option<u32>,
}

impl SearchPage {
    pub fn empty(offset: u32) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }
}

/// Located track collection and paging hints of a response.
struct Envelope<'a> {
    entries: &'a [Value],
    total: Option<u32>,
    has_next: Option<bool>,
}

fn locate_entries(value: &Value) -> Option<Envelope<'_>> {
    match value {
        Value::Array(entries) => Some(Envelope {
            entries,
            total: None,
            has_next: None,
        }),
        Value::Object(root) => {
            if let Some(tracks) = root.get("tracks") {
                match tracks {
                    Value::Array(entries) => {
                        return Some(Envelope {
                            entries,
                            total: read_u32(root, "total"),
                            has_next: read_has_next(root),
                        })
                    }
                    Value::Object(paging) => {
                        if let Some(Value::Array(entries)) = paging.get("items") {
                            return Some(Envelope {
                                entries,
                                total: read_u32(paging, "total"),
                                has_next: read_has_next(paging),
                            });
                        }
                    }
                    _ => {}
                }
            }

            COLLECTION_KEYS.iter().find_map(|key| match root.get(*key) {
                Some(Value::Array(entries)) => Some(Envelope {
                    entries,
                    total: read_u32(root, "total"),
                    has_next: read_has_next(root),
                }),
                _ => None,
            })
        }
        _ => None,
    }
}

/// Turn a decoded search response into a page of tracks.
///
/// Entries without an id are skipped with a warning; everything else is
/// kept, playable or not.
pub fn parse_search_page(value: &Value, offset: u32) -> Result<SearchPage> {
    let envelope = locate_entries(value).ok_or_else(|| {
        CatalogError::MalformedResponse("response holds no track collection".to_string())
    })?;

    let tracks: Vec<Track> = envelope
        .entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let track = normalize_entry(entry);
            if track.is_none() {
                warn!(index, "Skipping catalog entry without an id");
            }
            track
        })
        .collect();

    let consumed = u32::try_from(envelope.entries.len()).unwrap_or(u32::MAX);
    let end = offset.saturating_add(consumed);
    let next_offset = match (envelope.has_next, envelope.total) {
        (Some(true), _) => Some(end),
        (Some(false), _) => None,
        (None, Some(total)) if end < total && consumed > 0 => Some(end),
        _ => None,
    };

    Ok(SearchPage {
        tracks,
        offset,
        total: envelope.total,
        next_offset,
    })
}

/// Normalise a single entry. Returns `None` when it has no usable id.
pub fn normalize_entry(entry: &Value) -> Option<Track> {
    let fields = entry.as_object()?;

    let id = match fields.get("id")? {
        Value::String(id) if !id.trim().is_empty() => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };

    let title = read_str(fields, "title")
        .or_else(|| read_str(fields, "name"))
        .unwrap_or(UNTITLED);

    let mut track = Track::new(id, title)
        .with_artist(read_artist(fields))
        .with_album(read_album(fields));

    track.duration_seconds = read_duration(fields);
    track.playback_url = PLAYBACK_URL_KEYS
        .iter()
        .find_map(|key| read_str(fields, key))
        .map(str::to_string);
    track.cover_art_url = COVER_ART_KEYS
        .iter()
        .find_map(|key| read_str(fields, key))
        .or_else(|| first_album_image(fields))
        .map(str::to_string);

    Some(track)
}

/// All contributor names joined with `", "`.
fn read_artist(fields: &Map<String, Value>) -> String {
    if let Some(Value::Array(artists)) = fields.get("artists") {
        let names: Vec<&str> = artists
            .iter()
            .filter_map(|artist| match artist {
                Value::String(name) => Some(name.as_str()),
                Value::Object(artist) => read_str(artist, "name"),
                _ => None,
            })
            .collect();
        if !names.is_empty() {
            return names.join(", ");
        }
    }

    match fields.get("artist") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Object(artist)) => read_str(artist, "name").unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

fn read_album(fields: &Map<String, Value>) -> String {
    match fields.get("album") {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Object(album)) => read_str(album, "name").unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

fn read_duration(fields: &Map<String, Value>) -> Option<f64> {
    let seconds = match fields.get("duration_ms").and_then(Value::as_f64) {
        Some(millis) => millis / 1000.0,
        None => fields
            .get("duration")
            .or_else(|| fields.get("durationSeconds"))
            .and_then(Value::as_f64)?,
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn first_album_image(fields: &Map<String, Value>) -> Option<&str> {
    fields
        .get("album")?
        .get("images")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .filter(|url| !url.trim().is_empty())
}

/// Non-blank string field.
fn read_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn read_u32(fields: &Map<String, Value>, key: &str) -> Option<u32> {
    fields
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn read_has_next(fields: &Map<String, Value>) -> Option<bool> {
    fields.get("next").map(|next| match next {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(url) => !url.trim().is_empty(),
        _ => true,
    })
}
