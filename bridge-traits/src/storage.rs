//! Settings Storage Abstraction
//!
//! Client-scoped key-value storage. The library store persists its
//! serialized track list under a single key here, and playback preferences
//! (volume) live alongside it.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences/settings storage:
/// - Desktop: SQLite file
/// - Web: localStorage / IndexedDB
/// - Mobile: UserDefaults / SharedPreferences
///
/// Writes are expected to be durable once the returned future resolves;
/// callers treat a successful `set_string` as the commit point.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preference(store: &dyn SettingsStore) -> Result<()> {
///     store.set_f64("player.volume", 0.8).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a floating-point value
    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    /// Retrieve a floating-point value
    ///
    /// A stored value that does not parse as a number reads as `None`.
    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        Ok(self
            .get_string(key)
            .await?
            .and_then(|raw| raw.trim().parse::<f64>().ok()))
    }

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;
}
