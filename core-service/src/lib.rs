//! Core service façade.
//!
//! This crate wires the host-provided bridges (HTTP, settings, audio output)
//! into the catalog client, the library store and the playback controller,
//! and exposes them to a presentation layer through [`CoreService`]. Desktop
//! hosts typically enable the `desktop-shims` feature so the HTTP bridge
//! defaults to `bridge-desktop`'s reqwest client.
//!
//! ```ignore
//! use core_runtime::config::{CatalogApiConfig, CoreConfig};
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .catalog(CatalogApiConfig::new("https://api.example.com/v1").with_access_token(token))
//!     .settings_store(settings)
//!     .audio_output(audio)
//!     .build()?;
//!
//! let core = CoreService::new(config);
//! core.start().await;
//! let mut events = core.subscribe();
//! core.search("daft punk").await?;
//! ```

pub mod blobs;
pub mod error;
mod service;

pub use blobs::{BlobHandle, BlobRegistry, BLOB_URL_PREFIX};
pub use error::{CoreError, ErrorKind, Result};
pub use service::{CoreService, VOLUME_PREFERENCE_KEY};

pub use core_library::{Library, LoadOrigin, LoadReport, Track, TrackId};
pub use core_playback::{PlayOutcome, PlaybackState, PlaybackStatus};
pub use core_runtime::events::{CoreEvent, EventStream, LibraryEvent, PlaybackEvent, SearchEvent};
