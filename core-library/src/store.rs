//! Library Store
//!
//! Owns the user's saved tracks. The whole collection is the unit of
//! persistence: every mutation builds the next `Library`, writes it through
//! the [`SettingsStore`] bridge under a single key, and only then publishes
//! it to readers. Mutations are funneled through one async write gate, so two
//! concurrent adds can never interleave their read-modify-write cycles.
//!
//! A stored blob that could not be read during `load` is never overwritten
//! blindly: the next mutation reads it again first and fails with
//! [`LibraryError::Storage`] while it stays unreadable. A blob that reads
//! but does not decode is copied under `<key>.corrupt` before anything
//! replaces it.
//!
//! # Remote mirror
//!
//! When a [`RemoteLibrary`] is attached, `load` falls back to its snapshot if
//! nothing is stored locally, and every successful add is pushed to it
//! afterwards unless mirroring is switched off or the add is local-only. A
//! failed push is reported but never rolls back the local write. Removals
//! stay local.

use bridge_traits::storage::SettingsStore;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::models::{Library, Track, TrackId};
use crate::remote::RemoteLibrary;

/// Where the library came from during `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Local,
    Remote,
    Empty,
}

impl LoadOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadOrigin::Local => "local",
            LoadOrigin::Remote => "remote",
            LoadOrigin::Empty => "empty",
        }
    }
}

impl fmt::Display for LoadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suffix of the side key a corrupt library blob is backed up under.
pub const CORRUPT_BACKUP_SUFFIX: &str = ".corrupt";

/// Result of [`LibraryStore::load`].
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub library: Library,
    pub origin: LoadOrigin,
    /// Degradations that happened on the way, e.g. a corrupt local blob.
    pub warning: Option<String>,
}

/// Result of [`LibraryStore::add_reporting`].
#[derive(Debug)]
pub struct AddReport {
    pub library: Library,
    /// `false` when a track with the same id was already present.
    pub inserted: bool,
    /// Set when the local add succeeded but the remote mirror did not.
    pub mirror_error: Option<LibraryError>,
}

enum LocalBlob {
    Found(Library),
    Missing,
    Corrupt { raw: String, error: LibraryError },
    Unreadable(String),
}

/// State guarded by the write gate.
#[derive(Default)]
struct WriteState {
    /// The stored blob has not been read (or backed up) since `load`.
    local_unsettled: bool,
}

pub struct LibraryStore {
    settings: Arc<dyn SettingsStore>,
    storage_key: String,
    remote: Option<Arc<dyn RemoteLibrary>>,
    mirror_adds: bool,
    snapshot: RwLock<Library>,
    write_gate: Mutex<WriteState>,
}

impl LibraryStore {
    pub fn new(settings: Arc<dyn SettingsStore>, storage_key: impl Into<String>) -> Self {
        Self {
            settings,
            storage_key: storage_key.into(),
            remote: None,
            mirror_adds: false,
            snapshot: RwLock::new(Library::new()),
            write_gate: Mutex::new(WriteState::default()),
        }
    }

    /// Attach a remote library used as load fallback and add mirror.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteLibrary>) -> Self {
        self.remote = Some(remote);
        self.mirror_adds = true;
        self
    }

    /// Keep the remote as load fallback only, or mirror adds to it too.
    pub fn with_mirror_adds(mut self, enabled: bool) -> Self {
        self.mirror_adds = enabled;
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn corrupt_backup_key(&self) -> String {
        format!("{}{}", self.storage_key, CORRUPT_BACKUP_SUFFIX)
    }

    /// Load the persisted library, falling back to the remote snapshot and
    /// finally to an empty library. Never fails.
    ///
    /// The remote snapshot is written locally only when nothing was stored.
    #[instrument(skip(self), fields(key = %self.storage_key))]
    pub async fn load(&self) -> LoadReport {
        let mut state = self.write_gate.lock().await;
        let mut warnings = Vec::new();
        state.local_unsettled = false;

        let (local, nothing_stored) = match self.read_local().await {
            LocalBlob::Found(library) => (Some(library), false),
            LocalBlob::Missing => (None, true),
            LocalBlob::Corrupt { raw, error } => {
                warn!(error = %error, "Stored library is corrupt, ignoring it");
                warnings.push(format!("stored library could not be decoded: {}", error));
                match self.back_up_corrupt(&raw).await {
                    Ok(()) => warnings.push(format!(
                        "original kept under {}",
                        self.corrupt_backup_key()
                    )),
                    Err(e) => {
                        warnings.push(format!("corrupt library not backed up: {}", e));
                        state.local_unsettled = true;
                    }
                }
                (None, false)
            }
            LocalBlob::Unreadable(e) => {
                warn!(error = %e, "Failed to read stored library");
                warnings.push(format!("stored library could not be read: {}", e));
                state.local_unsettled = true;
                (None, false)
            }
        };

        let (library, origin) = match local {
            Some(library) => (library, LoadOrigin::Local),
            None => match self.fetch_remote_snapshot(nothing_stored, &mut warnings).await {
                Some(library) => (library, LoadOrigin::Remote),
                None => (Library::new(), LoadOrigin::Empty),
            },
        };

        *self.snapshot.write() = library.clone();
        info!(origin = %origin, track_count = library.len(), "Library loaded");

        LoadReport {
            library,
            origin,
            warning: if warnings.is_empty() {
                None
            } else {
                Some(warnings.join("; "))
            },
        }
    }

    async fn read_local(&self) -> LocalBlob {
        match self.settings.get_string(&self.storage_key).await {
            Ok(Some(raw)) => match Library::from_blob(&raw) {
                Ok(library) => LocalBlob::Found(library),
                Err(error) => LocalBlob::Corrupt { raw, error },
            },
            Ok(None) => LocalBlob::Missing,
            Err(e) => LocalBlob::Unreadable(e.to_string()),
        }
    }

    async fn back_up_corrupt(&self, raw: &str) -> Result<()> {
        let key = self.corrupt_backup_key();
        self.settings
            .set_string(&key, raw)
            .await
            .map_err(LibraryError::storage)?;
        info!(backup_key = %key, "Corrupt library blob backed up");
        Ok(())
    }

    /// Make sure the stored blob was seen before it gets replaced.
    ///
    /// A blob that reads fine now becomes the base of the next mutation.
    async fn settle_local(&self, state: &mut WriteState) -> Result<()> {
        if !state.local_unsettled {
            return Ok(());
        }

        match self.read_local().await {
            LocalBlob::Found(library) => {
                info!(track_count = library.len(), "Stored library readable again");
                *self.snapshot.write() = library;
            }
            LocalBlob::Missing => {}
            LocalBlob::Corrupt { raw, .. } => self.back_up_corrupt(&raw).await?,
            LocalBlob::Unreadable(e) => {
                warn!(error = %e, "Stored library still unreadable, refusing to overwrite it");
                return Err(LibraryError::Storage(format!(
                    "stored library could not be read, refusing to overwrite it: {}",
                    e
                )));
            }
        }

        state.local_unsettled = false;
        Ok(())
    }

    async fn fetch_remote_snapshot(
        &self,
        store_locally: bool,
        warnings: &mut Vec<String>,
    ) -> Option<Library> {
        let remote = self.remote.as_ref()?;
        let library = match remote.fetch_snapshot().await {
            Ok(library) => library,
            Err(e) => {
                warn!(error = %e, "Remote library snapshot unavailable");
                warnings.push(format!("remote library unavailable: {}", e));
                return None;
            }
        };

        if !store_locally {
            debug!("Stored library not settled, keeping remote snapshot in memory");
            return Some(library);
        }

        // Keep a local copy so the next start does not depend on the remote.
        if let Err(e) = self.persist(&library).await {
            warn!(error = %e, "Failed to store remote snapshot locally");
            warnings.push(format!("remote snapshot not stored locally: {}", e));
        }

        Some(library)
    }

    /// Add a track unless its id is already present.
    pub async fn add(&self, track: Track) -> Result<Library> {
        self.add_reporting(track).await.map(|report| report.library)
    }

    /// Like [`add`](Self::add) but also reports whether the track was new
    /// and how the remote mirror fared.
    pub async fn add_reporting(&self, track: Track) -> Result<AddReport> {
        self.insert_track(track, self.mirror_adds).await
    }

    /// Add a track that only makes sense on this client, such as one backed
    /// by an in-memory file. Never mirrored.
    pub async fn add_local_only(&self, track: Track) -> Result<AddReport> {
        self.insert_track(track, false).await
    }

    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn insert_track(&self, track: Track, mirror: bool) -> Result<AddReport> {
        track.validate()?;

        let mut gate = self.write_gate.lock().await;
        self.settle_local(&mut gate).await?;
        let mut next = self.snapshot.read().clone();
        if !next.insert(track.clone()) {
            debug!("Track already in library");
            return Ok(AddReport {
                library: next,
                inserted: false,
                mirror_error: None,
            });
        }

        self.persist(&next).await?;
        *self.snapshot.write() = next.clone();
        drop(gate);

        debug!(track_count = next.len(), "Track added");

        let mirror_error = match self.remote.as_ref().filter(|_| mirror) {
            Some(remote) => match remote.push_track(&track).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(error = %e, "Remote mirror failed, keeping local add");
                    Some(e)
                }
            },
            None => None,
        };

        Ok(AddReport {
            library: next,
            inserted: true,
            mirror_error,
        })
    }

    /// Remove a track by id. Absent ids are a no-op.
    #[instrument(skip(self), fields(track_id = %id))]
    pub async fn remove(&self, id: &TrackId) -> Result<Library> {
        let mut gate = self.write_gate.lock().await;
        self.settle_local(&mut gate).await?;
        let mut next = self.snapshot.read().clone();
        if next.remove(id).is_none() {
            debug!("Track not in library");
            return Ok(next);
        }

        self.persist(&next).await?;
        *self.snapshot.write() = next.clone();
        debug!(track_count = next.len(), "Track removed");
        Ok(next)
    }

    /// Replace the stored track with the same id, keeping its position.
    ///
    /// Returns the previous track, or `None` (and changes nothing) if no
    /// track with that id exists.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn replace(&self, track: Track) -> Result<Option<Track>> {
        track.validate()?;

        let mut gate = self.write_gate.lock().await;
        self.settle_local(&mut gate).await?;
        let mut next = self.snapshot.read().clone();
        let previous = match next.replace(track) {
            Some(previous) => previous,
            None => return Ok(None),
        };

        self.persist(&next).await?;
        *self.snapshot.write() = next;
        Ok(Some(previous))
    }

    pub fn library(&self) -> Library {
        self.snapshot.read().clone()
    }

    pub fn list(&self) -> Vec<Track> {
        self.snapshot.read().tracks().to_vec()
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.snapshot.read().get(id).cloned()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.snapshot.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    async fn persist(&self, library: &Library) -> Result<()> {
        let blob = library.to_blob()?;
        self.settings
            .set_string(&self.storage_key, &blob)
            .await
            .map_err(LibraryError::storage)
    }
}
