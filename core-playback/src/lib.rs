//! # Playback Module
//!
//! Transport control over the single host audio output.
//!
//! ## Overview
//!
//! This module handles:
//! - The `Idle/Loading/Playing/Paused/Errored` state machine
//! - Superseding in-flight loads when another track is started
//! - Queue navigation with a configurable end-of-list policy
//! - Volume and mute, with mute preserving the stored level

pub mod controller;
pub mod error;
pub mod source;
pub mod state;

pub use controller::{NavigationPolicy, PlayOutcome, PlaybackController};
pub use error::{PlaybackError, Result};
pub use source::{RemoteSourceResolver, SourceResolver};
pub use state::{PlaybackState, PlaybackStatus};
