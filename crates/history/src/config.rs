//! History configuration
//!
//! Limits and thumbnail preferences for a [`SnapshotHistory`](crate::SnapshotHistory).
//! Configuration can be built programmatically or overridden from
//! environment variables. Invalid values are rejected: validation reports
//! them, and [`HistoryConfig::sanitized`] falls back to the defaults for any
//! rejected field.

use crate::eviction::DEFAULT_MAX_ENTRIES;
use crate::thumbnail::{DEFAULT_THUMBNAIL_HEIGHT, MAX_THUMBNAIL_HEIGHT, MIN_THUMBNAIL_HEIGHT};

/// Environment variable overriding `max_entries`
pub const ENV_MAX_ENTRIES: &str = "PHOTO_EDITOR_HISTORY_MAX_ENTRIES";
/// Environment variable overriding `max_bytes` (`0` or empty clears it)
pub const ENV_MAX_BYTES: &str = "PHOTO_EDITOR_HISTORY_MAX_BYTES";
/// Environment variable overriding `thumbnail_height`
pub const ENV_THUMBNAIL_HEIGHT: &str = "PHOTO_EDITOR_HISTORY_THUMBNAIL_HEIGHT";
/// Environment variable toggling thumbnails (`on`/`off`/`true`/`false`/`1`/`0`)
pub const ENV_THUMBNAILS: &str = "PHOTO_EDITOR_HISTORY_THUMBNAILS";

/// Errors that can occur while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_entries must be greater than zero")]
    InvalidMaxEntries,

    #[error("max_bytes must be greater than zero")]
    InvalidMaxBytes,

    #[error("thumbnail height {height} is outside 48..=256")]
    ThumbnailHeightOutOfRange { height: u32 },

    #[error("invalid value {value:?} for {key}")]
    InvalidEnvValue { key: &'static str, value: String },
}

pub fn validate_max_entries(max_entries: usize) -> Result<usize, ConfigError> {
    if max_entries == 0 {
        return Err(ConfigError::InvalidMaxEntries);
    }
    Ok(max_entries)
}

pub fn validate_max_bytes(max_bytes: Option<u64>) -> Result<Option<u64>, ConfigError> {
    match max_bytes {
        Some(0) => Err(ConfigError::InvalidMaxBytes),
        other => Ok(other),
    }
}

pub fn validate_thumbnail_height(height: u32) -> Result<u32, ConfigError> {
    if !(MIN_THUMBNAIL_HEIGHT..=MAX_THUMBNAIL_HEIGHT).contains(&height) {
        return Err(ConfigError::ThumbnailHeightOutOfRange { height });
    }
    Ok(height)
}

/// Initialization settings for a history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum undo entries (default 50)
    pub max_entries: usize,
    /// Optional byte ceiling over both stacks
    pub max_bytes: Option<u64>,
    /// Return deep copies from undo/redo instead of the stored snapshot
    pub protect_returned_buffers: bool,
    /// Generate thumbnails after each push
    pub thumbnails_enabled: bool,
    /// Thumbnail height in pixels, 48..=256 (default 96)
    pub thumbnail_height: u32,
    /// Background thumbnail threads; 0 defers encodes to `run_idle_jobs`
    pub thumbnail_workers: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_bytes: None,
            protect_returned_buffers: false,
            thumbnails_enabled: true,
            thumbnail_height: DEFAULT_THUMBNAIL_HEIGHT,
            thumbnail_workers: 1,
        }
    }
}

impl HistoryConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_protect_returned_buffers(mut self, protect: bool) -> Self {
        self.protect_returned_buffers = protect;
        self
    }

    pub fn with_thumbnails(mut self, enabled: bool) -> Self {
        self.thumbnails_enabled = enabled;
        self
    }

    pub fn with_thumbnail_height(mut self, height: u32) -> Self {
        self.thumbnail_height = height;
        self
    }

    pub fn with_thumbnail_workers(mut self, workers: usize) -> Self {
        self.thumbnail_workers = workers;
        self
    }

    /// Check every field, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_max_entries(self.max_entries)?;
        validate_max_bytes(self.max_bytes)?;
        validate_thumbnail_height(self.thumbnail_height)?;
        Ok(())
    }

    /// Copy of this config with every invalid field reset to its default.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut config = self.clone();

        if let Err(err) = validate_max_entries(config.max_entries) {
            tracing::warn!(%err, "rejecting configured max_entries");
            config.max_entries = defaults.max_entries;
        }
        if let Err(err) = validate_max_bytes(config.max_bytes) {
            tracing::warn!(%err, "rejecting configured max_bytes");
            config.max_bytes = defaults.max_bytes;
        }
        if let Err(err) = validate_thumbnail_height(config.thumbnail_height) {
            tracing::warn!(%err, "rejecting configured thumbnail height");
            config.thumbnail_height = defaults.thumbnail_height;
        }

        config
    }

    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// # Errors
    /// Returns an error if a variable is set to something unparsable or
    /// outside its valid range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides to this configuration.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var(ENV_MAX_ENTRIES) {
            let parsed = parse_env(ENV_MAX_ENTRIES, &val)?;
            self.max_entries = validate_max_entries(parsed).map_err(|_| invalid(ENV_MAX_ENTRIES, &val))?;
        }

        if let Ok(val) = std::env::var(ENV_MAX_BYTES) {
            self.max_bytes = match val.trim() {
                "" | "0" => None,
                trimmed => Some(parse_env(ENV_MAX_BYTES, trimmed)?),
            };
        }

        if let Ok(val) = std::env::var(ENV_THUMBNAIL_HEIGHT) {
            let parsed = parse_env(ENV_THUMBNAIL_HEIGHT, &val)?;
            self.thumbnail_height =
                validate_thumbnail_height(parsed).map_err(|_| invalid(ENV_THUMBNAIL_HEIGHT, &val))?;
        }

        if let Ok(val) = std::env::var(ENV_THUMBNAILS) {
            self.thumbnails_enabled = match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => return Err(invalid(ENV_THUMBNAILS, &val)),
            };
        }

        Ok(self)
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvValue {
        key,
        value: value.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| invalid(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.max_bytes, None);
        assert!(!config.protect_returned_buffers);
        assert!(config.thumbnails_enabled);
        assert_eq!(config.thumbnail_height, 96);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = HistoryConfig::default()
            .with_max_entries(10)
            .with_max_bytes(Some(4096))
            .with_protect_returned_buffers(true)
            .with_thumbnails(false)
            .with_thumbnail_height(128)
            .with_thumbnail_workers(0);

        assert_eq!(config.max_entries, 10);
        assert_eq!(config.max_bytes, Some(4096));
        assert!(config.protect_returned_buffers);
        assert!(!config.thumbnails_enabled);
        assert_eq!(config.thumbnail_height, 128);
        assert_eq!(config.thumbnail_workers, 0);
    }

    #[test]
    fn test_validate_rejects_invalid_values() {
        assert_eq!(
            HistoryConfig::default().with_max_entries(0).validate(),
            Err(ConfigError::InvalidMaxEntries)
        );
        assert_eq!(
            HistoryConfig::default().with_max_bytes(Some(0)).validate(),
            Err(ConfigError::InvalidMaxBytes)
        );
        assert_eq!(
            HistoryConfig::default().with_thumbnail_height(47).validate(),
            Err(ConfigError::ThumbnailHeightOutOfRange { height: 47 })
        );
        assert_eq!(
            HistoryConfig::default().with_thumbnail_height(257).validate(),
            Err(ConfigError::ThumbnailHeightOutOfRange { height: 257 })
        );
        assert!(HistoryConfig::default().with_thumbnail_height(48).validate().is_ok());
        assert!(HistoryConfig::default().with_thumbnail_height(256).validate().is_ok());
    }

    #[test]
    fn test_sanitized_keeps_valid_and_resets_invalid() {
        let config = HistoryConfig::default()
            .with_max_entries(0)
            .with_max_bytes(Some(1024))
            .with_thumbnail_height(1000)
            .with_protect_returned_buffers(true)
            .sanitized();

        assert_eq!(config.max_entries, 50);
        assert_eq!(config.max_bytes, Some(1024));
        assert_eq!(config.thumbnail_height, 96);
        assert!(config.protect_returned_buffers);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&[ENV_MAX_ENTRIES, ENV_MAX_BYTES, ENV_THUMBNAIL_HEIGHT, ENV_THUMBNAILS]);

        env::set_var(ENV_MAX_ENTRIES, "20");
        env::set_var(ENV_MAX_BYTES, "1048576");
        env::set_var(ENV_THUMBNAIL_HEIGHT, "64");
        env::set_var(ENV_THUMBNAILS, "off");

        let config = HistoryConfig::from_env().unwrap();
        assert_eq!(config.max_entries, 20);
        assert_eq!(config.max_bytes, Some(1_048_576));
        assert_eq!(config.thumbnail_height, 64);
        assert!(!config.thumbnails_enabled);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&[ENV_MAX_ENTRIES, ENV_MAX_BYTES, ENV_THUMBNAIL_HEIGHT, ENV_THUMBNAILS]);

        env::remove_var(ENV_MAX_BYTES);
        env::remove_var(ENV_THUMBNAIL_HEIGHT);
        env::remove_var(ENV_THUMBNAILS);
        env::set_var(ENV_MAX_ENTRIES, "5");

        let config = HistoryConfig::from_env().unwrap();
        assert_eq!(config.max_entries, 5);
        assert_eq!(config.max_bytes, None);
        assert_eq!(config.thumbnail_height, 96);
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&[ENV_MAX_ENTRIES, ENV_THUMBNAIL_HEIGHT]);

        env::set_var(ENV_MAX_ENTRIES, "not_a_number");
        assert!(matches!(
            HistoryConfig::from_env(),
            Err(ConfigError::InvalidEnvValue { key: ENV_MAX_ENTRIES, .. })
        ));

        env::set_var(ENV_MAX_ENTRIES, "0");
        assert!(HistoryConfig::from_env().is_err());

        env::remove_var(ENV_MAX_ENTRIES);
        env::set_var(ENV_THUMBNAIL_HEIGHT, "12");
        assert!(matches!(
            HistoryConfig::from_env(),
            Err(ConfigError::InvalidEnvValue { key: ENV_THUMBNAIL_HEIGHT, .. })
        ));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }
}
