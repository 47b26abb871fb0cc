//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the player core and the
//! collaborators it does not own. Each trait represents a capability that the
//! core requires but that a host provides differently per platform (desktop,
//! browser, mobile).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Client-scoped key-value storage
//!
//! ### Audio
//! - [`AudioOutput`](playback::AudioOutput) - The single audio element the
//!   playback controller drives
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Provides |
//! |----------|----------------------|----------|
//! | Desktop  | `bridge-desktop`     | `HttpClient`, `SettingsStore` |
//! | Browser  | host-provided        | all traits |
//!
//! `AudioOutput` has no default implementation on any platform; hosts inject
//! the audio engine they already own.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report transport failures as `Network`/`Timeout` so callers can classify them
//! - Include error context (key names, URLs)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that handles can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{AudioDeviceEvent, AudioDeviceEventKind, AudioOutput, AudioSessionId, AudioSource};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
