//! Audio output bridge trait and supporting types.
//!
//! The player core never decodes audio itself. It drives a single host-owned
//! audio element through [`AudioOutput`] and receives progress back as
//! [`AudioDeviceEvent`]s tagged with the session that produced them.
//!
//! Every load is bound to an [`AudioSessionId`] minted by the caller. Events
//! carrying a session other than the current one belong to a superseded load
//! and are ignored by the controller.

use crate::error::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// High-level audio source descriptor handed to the output device.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Remote HTTP(S) stream fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
    /// In-memory audio bytes, typically a file the user imported.
    MemoryBuffer { data: Bytes, mime: Option<String> },
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
}

impl AudioSource {
    /// Remote stream without extra headers.
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Identifier of one load on the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioSessionId(Uuid);

impl AudioSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AudioSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AudioSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Notification raised by the output device for a given session.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDeviceEvent {
    pub session: AudioSessionId,
    pub kind: AudioDeviceEventKind,
}

impl AudioDeviceEvent {
    pub fn new(session: AudioSessionId, kind: AudioDeviceEventKind) -> Self {
        Self { session, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioDeviceEventKind {
    /// Playback position advanced.
    TimeUpdate { position: Duration },
    /// The device learned the media duration.
    LoadedMetadata { duration: Duration },
    /// The media reached its end.
    Ended,
    /// The device failed while loading or playing.
    Error { message: String },
}

/// The audio element driven by the playback controller.
///
/// Implementations must:
/// - treat `load` as replacing whatever was previously loaded
/// - reject commands for a released session with an error
/// - report progress through [`AudioDeviceEvent`]s carrying the session id
///
/// `set_volume` and `set_muted` apply to the device as a whole and survive
/// across loads.
#[async_trait::async_trait]
pub trait AudioOutput: Send + Sync {
    /// Load a source for the given session. Resolves once the device accepts it.
    async fn load(&self, session: AudioSessionId, source: AudioSource) -> Result<()>;

    /// Start or resume playback.
    async fn play(&self, session: AudioSessionId) -> Result<()>;

    /// Pause playback, keeping the position.
    async fn pause(&self, session: AudioSessionId) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, session: AudioSessionId, position: Duration) -> Result<()>;

    /// Set output gain, normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Release resources for a session. Releasing an unknown session is not an error.
    async fn release(&self, session: AudioSessionId) -> Result<()>;
}
