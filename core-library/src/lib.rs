//! # Library Store
//!
//! The user's persisted, ordered collection of saved tracks.
//!
//! ## Overview
//!
//! This crate provides:
//! - `Track` / `Library` models and the persisted JSON blob format
//! - `LibraryStore`: serialized, persist-then-publish mutations over the
//!   `SettingsStore` bridge
//! - `RemoteLibrary`: an optional best-effort mirror for added tracks

pub mod error;
pub mod models;
pub mod remote;
pub mod store;

pub use error::{LibraryError, Result};
pub use models::{Library, Track, TrackId};
pub use remote::{HttpRemoteLibrary, RemoteLibrary};
pub use store::{AddReport, LibraryStore, LoadOrigin, LoadReport, CORRUPT_BACKUP_SUFFIX};
