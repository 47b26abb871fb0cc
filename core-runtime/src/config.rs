//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings. It enforces
//! fail-fast validation so that every required bridge is present before the
//! service starts.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - Library persistence and player preferences
//! - `AudioOutput` - The audio element the playback controller drives
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - Catalog and remote library requests (desktop default: reqwest)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CatalogApiConfig, CoreConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .catalog(CatalogApiConfig::new("https://api.example.com/v1").with_access_token("token"))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .audio_output(Arc::new(MyAudioElement))
//!     .wrap_around_navigation(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder reports missing capabilities with actionable messages:
//!
//! ```should_panic
//! use core_runtime::config::{CatalogApiConfig, CoreConfig};
//!
//! // Fails: no SettingsStore or AudioOutput was injected
//! let config = CoreConfig::builder()
//!     .catalog(CatalogApiConfig::new("https://api.example.com/v1"))
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioOutput, HttpClient, SettingsStore};
use std::sync::Arc;
use std::time::Duration;

/// Default settings key the library blob is persisted under.
pub const DEFAULT_LIBRARY_STORAGE_KEY: &str = "library";

/// Largest page size the catalog accepts per request.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for catalog and remote library requests
    pub http_client: Arc<dyn HttpClient>,

    /// Client-scoped key-value storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Audio element driven by the playback controller (required)
    pub audio_output: Arc<dyn AudioOutput>,

    /// Catalog search service
    pub catalog: CatalogApiConfig,

    /// Library persistence
    pub library: LibraryConfig,

    /// Feature flags
    pub features: FeatureFlags,

    /// Playback start-up values
    pub playback: PlaybackDefaults,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("audio_output", &"AudioOutput { ... }")
            .field("catalog", &self.catalog)
            .field("library", &self.library)
            .field("features", &self.features)
            .field("playback", &self.playback)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Feature flags select between documented behaviour policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Mirror library adds to the remote library endpoint (requires `remote_url`)
    pub enable_remote_mirror: bool,

    /// Drop search results that carry no playback URL
    pub filter_unplayable_results: bool,

    /// `next`/`previous` wrap at the ends of the library instead of stopping
    pub wrap_around_navigation: bool,

    /// Start the next library track when the current one ends
    pub advance_on_end: bool,
}

/// Configuration for the catalog search service.
#[derive(Clone, PartialEq, Eq)]
pub struct CatalogApiConfig {
    /// Base URL; requests go to `{base_url}/search`
    pub base_url: String,

    /// Fixed bearer credential. Hosts that renew tokens inject a
    /// credential provider into the service instead.
    pub access_token: Option<String>,

    /// Results requested per page (1..=50)
    pub page_size: u32,

    /// Minimum spacing between two search requests. `0` disables throttling.
    pub min_request_interval_ms: u64,

    /// Per-request timeout
    pub request_timeout_ms: u64,

    /// Attempts per request including the first, for 429/5xx and transport failures
    pub max_attempts: u32,
}

impl std::fmt::Debug for CatalogApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogApiConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("page_size", &self.page_size)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl CatalogApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            page_size: 20,
            min_request_interval_ms: 0,
            request_timeout_ms: 10_000,
            max_attempts: 3,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_min_request_interval_ms(mut self, interval_ms: u64) -> Self {
        self.min_request_interval_ms = interval_ms;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config(
                "Catalog base URL is required. Use CatalogApiConfig::new(url).".to_string(),
            ));
        }

        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Catalog base URL must use http or https: {}",
                base
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Catalog page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                "Catalog request timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Catalog max attempts must be at least 1".to_string(),
            ));
        }

        if matches!(&self.access_token, Some(token) if token.trim().is_empty()) {
            return Err(Error::Config(
                "Catalog access token cannot be blank".to_string(),
            ));
        }

        Ok(())
    }
}

/// Library persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Settings key the serialized library is stored under
    pub storage_key: String,

    /// Remote library endpoint; snapshot source at load and mirror target
    pub remote_url: Option<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_LIBRARY_STORAGE_KEY.to_string(),
            remote_url: None,
        }
    }
}

/// Values the playback controller starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackDefaults {
    /// Volume used until a stored preference is restored (0.0..=1.0)
    pub initial_volume: f32,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.catalog.validate()?;

        if self.library.storage_key.trim().is_empty() {
            return Err(Error::Config(
                "Library storage key cannot be empty".to_string(),
            ));
        }

        if let Some(url) = &self.library.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "Remote library URL must use http or https: {}",
                    url
                )));
            }
        }

        if self.features.enable_remote_mirror && self.library.remote_url.is_none() {
            return Err(Error::Config(
                "Remote mirror enabled but no remote library URL configured. \
                 Disable the feature or set .remote_library_url()."
                    .to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.playback.initial_volume) {
            return Err(Error::Config(
                "Initial volume must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for library persistence. \
                 Desktop: inject bridge_desktop::SqliteSettingsStore. \
                 Web: inject a localStorage-backed settings store."
            .to_string(),
    }
}

fn audio_output_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioOutput".to_string(),
        message: "AudioOutput implementation is required for playback. \
                 Inject the host's audio element wrapper; the core ships no default."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(catalog: &CatalogApiConfig) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::with_timeout(catalog.request_timeout())?);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_catalog: &CatalogApiConfig) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for catalog search. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Web: inject a fetch-based HTTP client."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    catalog: Option<CatalogApiConfig>,
    library: LibraryConfig,
    features: FeatureFlags,
    playback: PlaybackDefaults,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client. Optional under `desktop-shims`.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the settings store (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the audio output (required).
    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Sets the catalog service configuration (required).
    pub fn catalog(mut self, catalog: CatalogApiConfig) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn library_storage_key(mut self, key: impl Into<String>) -> Self {
        self.library.storage_key = key.into();
        self
    }

    pub fn remote_library_url(mut self, url: impl Into<String>) -> Self {
        self.library.remote_url = Some(url.into());
        self
    }

    pub fn enable_remote_mirror(mut self, enabled: bool) -> Self {
        self.features.enable_remote_mirror = enabled;
        self
    }

    pub fn filter_unplayable_results(mut self, enabled: bool) -> Self {
        self.features.filter_unplayable_results = enabled;
        self
    }

    pub fn wrap_around_navigation(mut self, enabled: bool) -> Self {
        self.features.wrap_around_navigation = enabled;
        self
    }

    pub fn advance_on_end(mut self, enabled: bool) -> Self {
        self.features.advance_on_end = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.playback.initial_volume = volume;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// - The catalog configuration is missing or invalid
    /// - A required bridge is not provided
    /// - Feature flags are inconsistent with the rest of the configuration
    pub fn build(self) -> Result<CoreConfig> {
        let catalog = self.catalog.ok_or_else(|| {
            Error::Config(
                "Catalog configuration is required. Use .catalog(CatalogApiConfig::new(url))."
                    .to_string(),
            )
        })?;

        let settings_store = self
            .settings_store
            .ok_or_else(settings_store_missing_error)?;
        let audio_output = self.audio_output.ok_or_else(audio_output_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&catalog)?,
        };

        let config = CoreConfig {
            http_client,
            settings_store,
            audio_output,
            catalog,
            library: self.library,
            features: self.features,
            playback: self.playback,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
