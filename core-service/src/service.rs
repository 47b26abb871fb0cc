//! The coordinator that presentation layers talk to.
//!
//! `CoreService` owns one catalog client, one library store and one playback
//! controller, plus the current search results. Every command mutates state
//! first and publishes the matching [`CoreEvent`] afterwards, so a subscriber
//! that reacts to an event always reads the new state from the getters.

use bridge_traits::playback::{AudioDeviceEvent, AudioDeviceEventKind};
use bridge_traits::storage::SettingsStore;
use bytes::Bytes;
use core_library::{HttpRemoteLibrary, Library, LibraryStore, LoadReport, Track, TrackId};
use core_playback::{
    NavigationPolicy, PlayOutcome, PlaybackController, PlaybackError, PlaybackState,
    PlaybackStatus,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    CoreEvent, EventBus, EventStream, LibraryEvent, PlaybackEvent, SearchEvent,
};
use parking_lot::RwLock;
use provider_catalog::{
    CatalogClient, CatalogSettings, CredentialProvider, MissingCredential, StaticCredential,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::blobs::BlobRegistry;
use crate::error::{CoreError, Result};

/// Settings key the volume preference is stored under.
pub const VOLUME_PREFERENCE_KEY: &str = "player.volume";

const IMPORTED_TRACK_PREFIX: &str = "local-";
const UNTITLED: &str = "Untitled";

#[derive(Default)]
struct SearchResults {
    /// Generation of the search whose response is currently shown.
    generation: u64,
    tracks: Vec<Track>,
}

/// What a device event should be published as.
enum DeviceNotice {
    Position,
    Ended,
    Failed,
}

pub struct CoreService {
    settings: Arc<dyn SettingsStore>,
    catalog: CatalogClient,
    library: LibraryStore,
    playback: PlaybackController,
    blobs: Arc<BlobRegistry>,
    events: EventBus,
    search: RwLock<SearchResults>,
    search_generation: AtomicU64,
    advance_on_end: bool,
    initial_volume: f32,
}

impl CoreService {
    /// Build the service from a validated configuration.
    ///
    /// The catalog credential is the configured access token; without one,
    /// every search fails with an auth error.
    pub fn new(config: CoreConfig) -> Self {
        let credentials: Arc<dyn CredentialProvider> = match &config.catalog.access_token {
            Some(token) => Arc::new(StaticCredential::new(token.clone())),
            None => Arc::new(MissingCredential),
        };
        Self::with_credentials(config, credentials)
    }

    /// Build the service with a host-managed catalog credential.
    pub fn with_credentials(config: CoreConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let features = config.features;

        let catalog_settings = CatalogSettings::new(config.catalog.base_url.clone())
            .with_page_size(config.catalog.page_size)
            .with_min_request_interval(config.catalog.min_request_interval())
            .with_request_timeout(config.catalog.request_timeout())
            .with_max_attempts(config.catalog.max_attempts)
            .with_filter_unplayable(features.filter_unplayable_results);
        let catalog = CatalogClient::new(config.http_client.clone(), credentials, catalog_settings);

        let mut library = LibraryStore::new(
            config.settings_store.clone(),
            config.library.storage_key.clone(),
        );
        if let Some(url) = &config.library.remote_url {
            library = library
                .with_remote(Arc::new(HttpRemoteLibrary::new(config.http_client.clone(), url)))
                .with_mirror_adds(features.enable_remote_mirror);
        }

        let navigation = if features.wrap_around_navigation {
            NavigationPolicy::WrapAround
        } else {
            NavigationPolicy::StopAtEnds
        };
        let blobs = Arc::new(BlobRegistry::new());
        let playback = PlaybackController::new(config.audio_output.clone())
            .with_resolver(blobs.clone())
            .with_navigation(navigation)
            .with_initial_volume(config.playback.initial_volume);

        Self {
            settings: config.settings_store,
            catalog,
            library,
            playback,
            blobs,
            events: EventBus::new(config.event_buffer_size),
            search: RwLock::new(SearchResults::default()),
            search_generation: AtomicU64::new(0),
            advance_on_end: features.advance_on_end,
            initial_volume: config.playback.initial_volume,
        }
    }

    /// Load the library and restore the volume preference.
    #[instrument(skip(self))]
    pub async fn start(&self) -> LoadReport {
        let report = self.library.load().await;
        if let Some(warning) = &report.warning {
            warn!(warning = %warning, "Library loaded with degradations");
        }
        self.playback.set_queue(self.library.list());
        self.emit(CoreEvent::Library(LibraryEvent::Loaded {
            track_count: report.library.len(),
            origin: report.origin.to_string(),
        }));

        let volume = match self.settings.get_f64(VOLUME_PREFERENCE_KEY).await {
            Ok(Some(volume)) => volume as f32,
            Ok(None) => self.initial_volume,
            Err(e) => {
                warn!(error = %e, "Could not read volume preference");
                self.initial_volume
            }
        };
        if let Err(e) = self.playback.set_volume(volume).await {
            warn!(error = %e, "Could not apply restored volume");
        }
        self.publish_volume();

        info!(
            track_count = report.library.len(),
            origin = %report.origin,
            "Core service started"
        );
        report
    }

    /// Stop playback and release every imported file.
    pub async fn shutdown(&self) {
        self.playback.stop().await;
        let released = self.blobs.release_all();
        self.publish_state();
        info!(released_files = released, "Core service shut down");
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn library(&self) -> Library {
        self.library.library()
    }

    pub fn search_results(&self) -> Vec<Track> {
        self.search.read().tracks.clone()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.snapshot()
    }

    /// Imported files currently held in memory.
    pub fn imported_file_count(&self) -> usize {
        self.blobs.len()
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Search the catalog and replace the current results.
    ///
    /// On failure the previous results stay in place. A response that
    /// arrives after a newer search already completed is returned to the
    /// caller but never shown.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query_text = query.trim().to_string();

        match self.catalog.search(query).await {
            Ok(tracks) => {
                let applied = {
                    let mut search = self.search.write();
                    if generation < search.generation {
                        false
                    } else {
                        search.generation = generation;
                        search.tracks = tracks.clone();
                        true
                    }
                };
                if applied {
                    self.emit(CoreEvent::Search(SearchEvent::Completed {
                        query: query_text,
                        result_count: tracks.len(),
                    }));
                } else {
                    debug!(query = %query_text, "Discarding results of a superseded search");
                }
                Ok(tracks)
            }
            Err(error) => {
                warn!(query = %query_text, error = %error, "Search failed, keeping previous results");
                self.emit(CoreEvent::Search(SearchEvent::Failed {
                    query: query_text,
                    message: error.to_string(),
                }));
                Err(error.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Save a track. Adding one that is already saved changes nothing.
    pub async fn add_to_library(&self, track: Track) -> Result<Library> {
        let track_id = track.id.to_string();
        let title = track.title.clone();
        let report = self.library.add_reporting(track).await?;

        self.playback.set_queue(self.library.list());
        if report.inserted {
            self.emit(CoreEvent::Library(LibraryEvent::TrackAdded {
                track_id: track_id.clone(),
                title,
            }));
        }
        if let Some(error) = report.mirror_error {
            self.emit(CoreEvent::Library(LibraryEvent::MirrorFailed {
                track_id,
                message: error.to_string(),
            }));
        }
        Ok(report.library)
    }

    pub async fn remove_from_library(&self, id: &TrackId) -> Result<Library> {
        let present = self.library.contains(id);
        let library = self.library.remove(id).await?;

        self.playback.set_queue(self.library.list());
        self.sweep_blobs();
        if present {
            self.emit(CoreEvent::Library(LibraryEvent::TrackRemoved {
                track_id: id.to_string(),
            }));
        }
        Ok(library)
    }

    /// Keep a local audio file in memory and save it as a library track.
    ///
    /// The track is titled after the file name and never mirrored remotely.
    pub async fn import_local_file(&self, file_name: &str, data: Bytes) -> Result<Track> {
        let handle = self.blobs.register(file_name, data);
        let track = Track::new(
            format!("{}{}", IMPORTED_TRACK_PREFIX, handle.id),
            title_from_file_name(file_name),
        )
        .with_playback_url(handle.url.clone());

        let report = match self.library.add_local_only(track.clone()).await {
            Ok(report) => report,
            Err(error) => {
                self.blobs.release(&handle.url);
                return Err(error.into());
            }
        };

        self.playback.set_queue(self.library.list());
        self.emit(CoreEvent::Library(LibraryEvent::TrackAdded {
            track_id: track.id.to_string(),
            title: track.title.clone(),
        }));
        Ok(track)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Play a track from the library or, failing that, the search results.
    pub async fn play_track(&self, id: &TrackId) -> Result<PlayOutcome> {
        let track = self
            .library
            .get(id)
            .or_else(|| {
                self.search
                    .read()
                    .tracks
                    .iter()
                    .find(|track| &track.id == id)
                    .cloned()
            })
            .ok_or_else(|| CoreError::TrackNotFound(id.clone()))?;

        let result = self.playback.play(track).await;
        self.finish_play(result)
    }

    /// Resume when paused, otherwise restart the current track.
    pub async fn play(&self) -> Result<PlayOutcome> {
        match self.playback.status() {
            PlaybackStatus::Playing => Ok(PlayOutcome::Started),
            PlaybackStatus::Paused => {
                self.resume().await?;
                Ok(PlayOutcome::Started)
            }
            PlaybackStatus::Loading => Err(PlaybackError::InvalidState {
                operation: "play",
                status: PlaybackStatus::Loading,
            }
            .into()),
            PlaybackStatus::Idle | PlaybackStatus::Errored => {
                let track = self
                    .playback
                    .current_track()
                    .ok_or(PlaybackError::NoTrackLoaded)?;
                let result = self.playback.play(track).await;
                self.finish_play(result)
            }
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let result = self.playback.pause().await;
        self.publish_state();
        result.map_err(Into::into)
    }

    pub async fn resume(&self) -> Result<()> {
        let result = self.playback.resume().await;
        self.publish_state();
        result.map_err(Into::into)
    }

    pub async fn stop(&self) {
        self.playback.stop().await;
        self.publish_state();
    }

    /// Seek within the current track. Returns the clamped position.
    pub async fn seek(&self, position_seconds: f64) -> Result<f64> {
        let position = self.playback.seek(position_seconds).await?;
        self.publish_position();
        Ok(position)
    }

    pub async fn next(&self) -> Result<Option<PlayOutcome>> {
        let result = match self.playback.next().await {
            Ok(None) => return Ok(None),
            Ok(Some(outcome)) => Ok(outcome),
            Err(error) => Err(error),
        };
        self.finish_play(result).map(Some)
    }

    pub async fn previous(&self) -> Result<Option<PlayOutcome>> {
        let result = match self.playback.previous().await {
            Ok(None) => return Ok(None),
            Ok(Some(outcome)) => Ok(outcome),
            Err(error) => Err(error),
        };
        self.finish_play(result).map(Some)
    }

    /// Set and remember the volume. Returns the clamped level.
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        let volume = self.playback.set_volume(volume).await?;
        if let Err(e) = self
            .settings
            .set_f64(VOLUME_PREFERENCE_KEY, f64::from(volume))
            .await
        {
            warn!(error = %e, "Could not store volume preference");
        }
        self.publish_volume();
        Ok(volume)
    }

    /// Flip mute, keeping the stored volume. Returns the new mute flag.
    pub async fn toggle_mute(&self) -> Result<bool> {
        let muted = self.playback.toggle_mute().await?;
        self.publish_volume();
        Ok(muted)
    }

    /// Feed a notification from the audio output into the controller.
    pub async fn handle_device_event(&self, event: AudioDeviceEvent) {
        let notice = match &event.kind {
            AudioDeviceEventKind::TimeUpdate { .. }
            | AudioDeviceEventKind::LoadedMetadata { .. } => DeviceNotice::Position,
            AudioDeviceEventKind::Ended => DeviceNotice::Ended,
            AudioDeviceEventKind::Error { .. } => DeviceNotice::Failed,
        };

        let Some(state) = self.playback.handle_device_event(event).await else {
            return;
        };

        match notice {
            DeviceNotice::Position => self.publish_position(),
            DeviceNotice::Ended => {
                self.publish_state();
                if self.advance_on_end {
                    if let Err(e) = self.next().await {
                        warn!(error = %e, "Could not advance to the next track");
                    }
                }
            }
            DeviceNotice::Failed => {
                self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    track_id: state.current_track_id.as_ref().map(ToString::to_string),
                    message: state
                        .last_error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                }));
                self.publish_state();
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Sweep blobs and publish after a track switch.
    fn finish_play(&self, result: core_playback::Result<PlayOutcome>) -> Result<PlayOutcome> {
        self.sweep_blobs();
        match result {
            // The call that superseded this one publishes its own outcome.
            Ok(PlayOutcome::Superseded) => Ok(PlayOutcome::Superseded),
            Ok(outcome) => {
                if outcome == PlayOutcome::NotPlayable {
                    self.publish_error();
                }
                self.publish_state();
                Ok(outcome)
            }
            Err(error) => {
                self.publish_error();
                self.publish_state();
                Err(error.into())
            }
        }
    }

    /// Release imported files that neither the library nor the current
    /// track refers to.
    fn sweep_blobs(&self) {
        if self.blobs.is_empty() {
            return;
        }
        let library = self.library.library();
        let current = self.playback.current_track();
        let referenced = library
            .tracks()
            .iter()
            .chain(current.iter())
            .filter_map(|track| track.playback_url.as_deref())
            .filter(|url| BlobRegistry::is_blob_url(url));
        self.blobs.retain_referenced(referenced);
    }

    fn publish_state(&self) {
        let state = self.playback.snapshot();
        self.emit(CoreEvent::Playback(PlaybackEvent::StateChanged {
            track_id: state.current_track_id.as_ref().map(ToString::to_string),
            status: state.status.as_str().to_string(),
            is_playing: state.is_playing,
        }));
    }

    fn publish_position(&self) {
        let state = self.playback.snapshot();
        if let Some(track_id) = &state.current_track_id {
            self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                track_id: track_id.to_string(),
                position_ms: seconds_to_ms(state.position_seconds),
                duration_ms: state.duration_seconds.map(seconds_to_ms),
            }));
        }
    }

    fn publish_volume(&self) {
        let state = self.playback.snapshot();
        self.emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged {
            volume: state.volume,
            muted: state.muted,
        }));
    }

    fn publish_error(&self) {
        let state = self.playback.snapshot();
        if let Some(error) = &state.last_error {
            self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                track_id: state.current_track_id.as_ref().map(ToString::to_string),
                message: error.to_string(),
            }));
        }
    }

    fn emit(&self, event: CoreEvent) {
        // Err only means nobody is subscribed.
        if self.events.emit(event).is_err() {
            debug!("No event subscribers");
        }
    }
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("Morning Walk.mp3"), "Morning Walk");
        assert_eq!(title_from_file_name("music/album/02 - Intro.flac"), "02 - Intro");
        assert_eq!(title_from_file_name("no_extension"), "no_extension");
        assert_eq!(title_from_file_name(""), UNTITLED);
    }

    #[test]
    fn test_seconds_to_ms() {
        assert_eq!(seconds_to_ms(1.2345), 1235);
        assert_eq!(seconds_to_ms(-3.0), 0);
    }
}
