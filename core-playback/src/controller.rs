//! Playback Controller
//!
//! Owns the transport state and drives exactly one [`AudioOutput`].
//!
//! ## State machine
//!
//! ```text
//! Idle ──play(playable)──► Loading ──device started──► Playing ◄──resume── Paused
//!  ▲                          │                           │ pause ─────────►  ▲
//!  │ stop                     └──device error──► Errored  └──ended───────────┘
//! ```
//!
//! `play` of a track without a playback URL leaves the controller `Idle` with
//! `last_error` set. Switching tracks releases the previous session before the
//! next source is loaded, so two sources never play at once.
//!
//! ## Supersession
//!
//! Every `play` bumps a generation counter and mints a fresh
//! [`AudioSessionId`]. After each device await the call re-checks the
//! generation; if a newer `play` or `stop` ran in between, the stale call
//! returns [`PlayOutcome::Superseded`] without touching state. Device events
//! tagged with any session other than the current one are dropped.
//!
//! State lives behind a synchronous lock that is never held across an await.

use bridge_traits::playback::{AudioDeviceEvent, AudioDeviceEventKind, AudioOutput, AudioSessionId};
use core_library::Track;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::source::{RemoteSourceResolver, SourceResolver};
use crate::state::{PlaybackState, PlaybackStatus};

/// Behaviour of `next`/`previous` at the ends of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationPolicy {
    /// Stay on the first/last track.
    #[default]
    StopAtEnds,
    /// Continue from the other end.
    WrapAround,
}

/// How a `play` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The device confirmed playback of this track.
    Started,
    /// A newer `play` or `stop` replaced this one before it finished.
    Superseded,
    /// The track has no playback URL; `last_error` was set.
    NotPlayable,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Next,
    Previous,
}

struct Inner {
    state: PlaybackState,
    current_track: Option<Track>,
    session: Option<AudioSessionId>,
    generation: u64,
    /// Set when the device reported the end of the media.
    ended: bool,
    queue: Vec<Track>,
}

impl Inner {
    /// Point the state at `track` with a fresh position.
    fn begin(&mut self, track: Track) {
        self.state.current_track_id = Some(track.id.clone());
        self.state.is_playing = false;
        self.state.position_seconds = 0.0;
        self.state.duration_seconds = track.duration_seconds;
        self.state.last_error = None;
        self.current_track = Some(track);
        self.ended = false;
    }

    /// Require one of `allowed`, returning the live session.
    fn require(
        &self,
        operation: &'static str,
        allowed: &[PlaybackStatus],
    ) -> Result<AudioSessionId> {
        if self.state.current_track_id.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let status = self.state.status;
        match self.session {
            Some(session) if allowed.contains(&status) => Ok(session),
            _ => Err(PlaybackError::InvalidState { operation, status }),
        }
    }
}

enum Checkpoint {
    Current,
    Superseded,
    Failed(PlaybackError),
}

pub struct PlaybackController {
    output: Arc<dyn AudioOutput>,
    resolver: Arc<dyn SourceResolver>,
    navigation: NavigationPolicy,
    inner: Mutex<Inner>,
}

impl PlaybackController {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            resolver: Arc::new(RemoteSourceResolver),
            navigation: NavigationPolicy::default(),
            inner: Mutex::new(Inner {
                state: PlaybackState::default(),
                current_track: None,
                session: None,
                generation: 0,
                ended: false,
                queue: Vec::new(),
            }),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_navigation(mut self, navigation: NavigationPolicy) -> Self {
        self.navigation = navigation;
        self
    }

    /// Stored volume before the device has been told anything.
    pub fn with_initial_volume(self, volume: f32) -> Self {
        self.inner.lock().state.volume = clamp_volume(volume);
        self
    }

    pub fn navigation(&self) -> NavigationPolicy {
        self.navigation
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.inner.lock().state.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner.lock().state.status
    }

    /// The track `current_track_id` refers to, as it was when started.
    pub fn current_track(&self) -> Option<Track> {
        self.inner.lock().current_track.clone()
    }

    /// Replace the ordered list `next`/`previous` walk over.
    pub fn set_queue(&self, tracks: Vec<Track>) {
        self.inner.lock().queue = tracks;
    }

    pub fn queue(&self) -> Vec<Track> {
        self.inner.lock().queue.clone()
    }

    /// Switch to `track` and start it.
    ///
    /// Resolves once the device confirmed playback, or earlier if a newer
    /// call superseded this one.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play(&self, track: Track) -> Result<PlayOutcome> {
        if !track.is_playable() {
            let track_id = track.id.clone();
            let previous = {
                let mut inner = self.inner.lock();
                inner.generation += 1;
                let previous = inner.session.take();
                inner.begin(track);
                inner.state.status = PlaybackStatus::Idle;
                inner.state.last_error = Some(PlaybackError::NotPlayable(track_id));
                previous
            };
            self.release(previous).await;
            warn!("Track has no playback URL");
            return Ok(PlayOutcome::NotPlayable);
        }

        let source = self.resolver.resolve(&track);
        let session = AudioSessionId::new();
        let (generation, previous) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            let previous = inner.session.take();
            inner.begin(track);
            match &source {
                Ok(_) => {
                    inner.state.status = PlaybackStatus::Loading;
                    inner.session = Some(session);
                }
                Err(error) => {
                    inner.state.status = PlaybackStatus::Errored;
                    inner.state.last_error = Some(error.clone());
                }
            }
            (inner.generation, previous)
        };

        // Tear down the old source before anything new reaches the device.
        self.release(previous).await;

        let source = match source {
            Ok(source) => source,
            Err(error) => {
                warn!(error = %error, "Could not resolve playback source");
                return Err(error);
            }
        };

        debug!(session = %session, "Loading source");
        if let Err(e) = self.output.load(session, source).await {
            return self
                .fail_load(generation, session, PlaybackError::LoadFailed(e.to_string()))
                .await;
        }

        match self.checkpoint(generation) {
            Checkpoint::Current => {}
            Checkpoint::Superseded => return Ok(PlayOutcome::Superseded),
            Checkpoint::Failed(error) => return Err(error),
        }

        if let Err(e) = self.output.play(session).await {
            return self
                .fail_load(generation, session, PlaybackError::LoadFailed(e.to_string()))
                .await;
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("Play superseded after device start");
            return Ok(PlayOutcome::Superseded);
        }
        if inner.state.status != PlaybackStatus::Loading {
            return Err(inner
                .state
                .last_error
                .clone()
                .unwrap_or_else(|| PlaybackError::LoadFailed("playback did not start".to_string())));
        }
        inner.state.status = PlaybackStatus::Playing;
        inner.state.is_playing = true;
        info!("Playback started");
        Ok(PlayOutcome::Started)
    }

    fn checkpoint(&self, generation: u64) -> Checkpoint {
        let inner = self.inner.lock();
        if inner.generation != generation {
            debug!("Play superseded during load");
            return Checkpoint::Superseded;
        }
        if inner.state.status == PlaybackStatus::Errored {
            return Checkpoint::Failed(
                inner
                    .state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| PlaybackError::LoadFailed("device error".to_string())),
            );
        }
        Checkpoint::Current
    }

    async fn fail_load(
        &self,
        generation: u64,
        session: AudioSessionId,
        error: PlaybackError,
    ) -> Result<PlayOutcome> {
        let failure = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                None
            } else {
                // A device error event may already have recorded the cause.
                if inner.state.status != PlaybackStatus::Errored {
                    inner.state.status = PlaybackStatus::Errored;
                    inner.state.is_playing = false;
                    inner.state.last_error = Some(error.clone());
                }
                let owned = if inner.session == Some(session) {
                    inner.session.take()
                } else {
                    None
                };
                Some((inner.state.last_error.clone().unwrap_or(error), owned))
            }
        };

        match failure {
            None => Ok(PlayOutcome::Superseded),
            Some((error, owned)) => {
                warn!(error = %error, "Load failed");
                self.release(owned).await;
                Err(error)
            }
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let session = {
            let inner = self.inner.lock();
            if inner.state.status == PlaybackStatus::Paused {
                return Ok(());
            }
            inner.require("pause", &[PlaybackStatus::Playing])?
        };

        if let Err(e) = self.output.pause(session).await {
            return Err(self.record_device_error(e.to_string()));
        }

        let mut inner = self.inner.lock();
        if inner.session == Some(session) && inner.state.status == PlaybackStatus::Playing {
            inner.state.status = PlaybackStatus::Paused;
            inner.state.is_playing = false;
        }
        Ok(())
    }

    /// Continue a paused track. A track that ended starts over.
    pub async fn resume(&self) -> Result<()> {
        let (session, restart) = {
            let inner = self.inner.lock();
            if inner.state.status == PlaybackStatus::Playing {
                return Ok(());
            }
            (inner.require("resume", &[PlaybackStatus::Paused])?, inner.ended)
        };

        if restart {
            if let Err(e) = self.output.seek(session, Duration::ZERO).await {
                return Err(self.record_device_error(e.to_string()));
            }
        }
        if let Err(e) = self.output.play(session).await {
            return Err(self.record_device_error(e.to_string()));
        }

        let mut inner = self.inner.lock();
        if inner.session == Some(session) && inner.state.status == PlaybackStatus::Paused {
            inner.state.status = PlaybackStatus::Playing;
            inner.state.is_playing = true;
            if restart {
                inner.state.position_seconds = 0.0;
                inner.ended = false;
            }
        }
        Ok(())
    }

    /// Seek within the current track, clamped to `[0, duration]`.
    ///
    /// Returns the position actually requested from the device.
    pub async fn seek(&self, position_seconds: f64) -> Result<f64> {
        let (session, target) = {
            let inner = self.inner.lock();
            let session =
                inner.require("seek", &[PlaybackStatus::Playing, PlaybackStatus::Paused])?;
            let mut target = if position_seconds.is_nan() {
                0.0
            } else {
                position_seconds.max(0.0)
            };
            if let Some(duration) = inner.state.duration_seconds {
                target = target.min(duration);
            }
            (session, target)
        };

        let position = Duration::try_from_secs_f64(target).map_err(|_| {
            PlaybackError::InvalidState {
                operation: "seek past a position of unknown duration",
                status: self.status(),
            }
        })?;

        if let Err(e) = self.output.seek(session, position).await {
            return Err(self.record_device_error(e.to_string()));
        }

        let mut inner = self.inner.lock();
        if inner.session == Some(session) {
            inner.state.position_seconds = target;
            inner.ended = false;
        }
        Ok(target)
    }

    /// Set the stored volume, clamped to `[0, 1]`. Mute state is unchanged.
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        let volume = clamp_volume(volume);
        self.output
            .set_volume(volume)
            .await
            .map_err(|e| PlaybackError::DeviceError(e.to_string()))?;
        self.inner.lock().state.volume = volume;
        Ok(volume)
    }

    /// Flip `muted` without touching the stored volume. Returns the new value.
    pub async fn toggle_mute(&self) -> Result<bool> {
        let muted = !self.inner.lock().state.muted;
        self.output
            .set_muted(muted)
            .await
            .map_err(|e| PlaybackError::DeviceError(e.to_string()))?;
        self.inner.lock().state.muted = muted;
        Ok(muted)
    }

    /// Return to `Idle`, releasing the session. The current track is kept.
    pub async fn stop(&self) {
        let previous = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state.status = PlaybackStatus::Idle;
            inner.state.is_playing = false;
            inner.state.position_seconds = 0.0;
            inner.ended = false;
            inner.session.take()
        };
        self.release(previous).await;
    }

    /// Play the track after the current one in the queue.
    ///
    /// `Ok(None)` means nothing to move to: at the end (without wrap), or the
    /// current track is not in the queue.
    pub async fn next(&self) -> Result<Option<PlayOutcome>> {
        match self.neighbour(Step::Next) {
            Some(track) => self.play(track).await.map(Some),
            None => Ok(None),
        }
    }

    /// Play the track before the current one in the queue.
    pub async fn previous(&self) -> Result<Option<PlayOutcome>> {
        match self.neighbour(Step::Previous) {
            Some(track) => self.play(track).await.map(Some),
            None => Ok(None),
        }
    }

    fn neighbour(&self, step: Step) -> Option<Track> {
        let inner = self.inner.lock();
        let current = inner.state.current_track_id.as_ref()?;
        let index = inner.queue.iter().position(|track| &track.id == current)?;
        let last = inner.queue.len() - 1;

        let target = match (step, self.navigation) {
            (Step::Next, _) if index < last => index + 1,
            (Step::Next, NavigationPolicy::WrapAround) => 0,
            (Step::Previous, _) if index > 0 => index - 1,
            (Step::Previous, NavigationPolicy::WrapAround) => last,
            _ => return None,
        };
        if target == index {
            return None;
        }
        inner.queue.get(target).cloned()
    }

    /// Apply a device notification.
    ///
    /// Returns the updated state, or `None` when the event belongs to a
    /// session that is no longer current.
    pub async fn handle_device_event(&self, event: AudioDeviceEvent) -> Option<PlaybackState> {
        let (snapshot, released) = {
            let mut inner = self.inner.lock();
            if inner.session != Some(event.session) {
                debug!(session = %event.session, "Ignoring event from stale session");
                return None;
            }

            let mut released = None;
            match event.kind {
                AudioDeviceEventKind::TimeUpdate { position } => {
                    let mut seconds = position.as_secs_f64();
                    if let Some(duration) = inner.state.duration_seconds {
                        seconds = seconds.min(duration);
                    }
                    inner.state.position_seconds = seconds;
                }
                AudioDeviceEventKind::LoadedMetadata { duration } => {
                    inner.state.duration_seconds = Some(duration.as_secs_f64());
                }
                AudioDeviceEventKind::Ended => {
                    inner.state.status = PlaybackStatus::Paused;
                    inner.state.is_playing = false;
                    if let Some(duration) = inner.state.duration_seconds {
                        inner.state.position_seconds = duration;
                    }
                    inner.ended = true;
                }
                AudioDeviceEventKind::Error { message } => {
                    let error = if inner.state.status == PlaybackStatus::Loading {
                        PlaybackError::LoadFailed(message)
                    } else {
                        PlaybackError::DeviceError(message)
                    };
                    warn!(error = %error, "Audio device reported an error");
                    inner.state.status = PlaybackStatus::Errored;
                    inner.state.is_playing = false;
                    inner.state.last_error = Some(error);
                    released = inner.session.take();
                }
            }
            (inner.state.clone(), released)
        };

        self.release(released).await;
        Some(snapshot)
    }

    /// Record a failed transport command. The device is treated as not playing.
    fn record_device_error(&self, message: String) -> PlaybackError {
        let error = PlaybackError::DeviceError(message);
        let mut inner = self.inner.lock();
        if inner.state.status == PlaybackStatus::Playing {
            inner.state.status = PlaybackStatus::Paused;
        }
        inner.state.is_playing = false;
        inner.state.last_error = Some(error.clone());
        warn!(error = %error, "Audio device command failed");
        error
    }

    async fn release(&self, session: Option<AudioSessionId>) {
        if let Some(session) = session {
            if let Err(e) = self.output.release(session).await {
                debug!(session = %session, error = %e, "Releasing session failed");
            }
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(1.5), 1.0);
        assert_eq!(clamp_volume(-1.0), 0.0);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_volume(0.25), 0.25);
    }
}
