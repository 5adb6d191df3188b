//! # Configuration
//!
//! Settings are collected into a flat string key/value store and then parsed
//! into typed structs. Environment variables carrying the `DROPSHARE__` prefix
//! are folded into the store with `__` mapped to `.` and keys lowercased:
//!
//! ```bash
//! export DROPSHARE__BASE_URL=https://share.example.com/f/
//! export DROPSHARE__TIMERS__CONFIRM_DELAY_MS=1500
//! export DROPSHARE__STORAGE__CHUNK_SIZE=65536
//! ```
//!
//! becomes `base_url`, `timers.confirm_delay_ms` and `storage.chunk_size`.
//!
//! ```rust
//! use dropshare_upload::{ConfigValues, UploadConfig};
//!
//! let values = ConfigValues::from_vars(
//!     [("DROPSHARE__BASE_URL".to_string(), "https://s.io/".to_string())],
//!     "DROPSHARE__",
//! );
//! let config = UploadConfig::from_values(&values).unwrap();
//! assert_eq!(config.share_url("abc123"), "https://s.io/abc123");
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use dropshare_blob::{BlobConfig, PrefixKeyStrategy};

use crate::{UploadError, UploadResult};

/// Environment prefix read by [`ConfigValues::from_env`]
pub const ENV_PREFIX: &str = "DROPSHARE__";

/// Flat string key/value settings
#[derive(Debug, Clone, Default)]
pub struct ConfigValues {
    values: HashMap<String, String>,
}

impl ConfigValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `DROPSHARE__*` variable of the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars(), ENV_PREFIX)
    }

    /// Collect the `prefix`ed entries of `vars`
    pub fn from_vars<I>(vars: I, prefix: &str) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values = Self::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                values.set(normalized, value);
            }
        }
        values
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Parse `key` if present
    pub fn parse<T>(&self, key: &str) -> UploadResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| UploadError::config(key, format!("'{}': {}", raw, e))),
        }
    }
}

/// Settings of the upload page
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Prefix of share links; the record id is appended verbatim
    pub base_url: String,

    /// Document collection upload records are written to
    pub collection: String,

    /// Storage key prefix for uploaded files
    pub key_prefix: String,

    /// Delay between a finished transfer and the completion view
    pub confirm_delay: Duration,

    /// Delay between the completion view and the preview redirect
    pub redirect_delay: Duration,

    /// Length of generated record ids
    pub record_id_length: usize,

    pub sign_in_route: String,

    /// Preview route prefix; the record id is appended
    pub preview_route: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            collection: "uploadedFile".to_string(),
            key_prefix: PrefixKeyStrategy::DEFAULT_PREFIX.to_string(),
            confirm_delay: Duration::from_secs(2),
            redirect_delay: Duration::from_secs(2),
            record_id_length: 6,
            sign_in_route: "/sign-in".to_string(),
            preview_route: "/file-preview/".to_string(),
        }
    }
}

impl UploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> UploadResult<Self> {
        Self::from_values(&ConfigValues::from_env())
    }

    /// Defaults overridden by whatever `values` carries
    pub fn from_values(values: &ConfigValues) -> UploadResult<Self> {
        let mut config = Self::default();

        if let Some(url) = values.get("base_url") {
            config.base_url = url.to_string();
        }
        if let Some(collection) = values.get("collection") {
            if collection.is_empty() {
                return Err(UploadError::config("collection", "must not be empty"));
            }
            config.collection = collection.to_string();
        }
        if let Some(prefix) = values.get("storage.key_prefix") {
            config.key_prefix = prefix.to_string();
        }
        if let Some(ms) = values.parse::<u64>("timers.confirm_delay_ms")? {
            config.confirm_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = values.parse::<u64>("timers.redirect_delay_ms")? {
            config.redirect_delay = Duration::from_millis(ms);
        }
        if let Some(len) = values.parse::<usize>("record_id_length")? {
            if len == 0 {
                return Err(UploadError::config("record_id_length", "must be at least 1"));
            }
            config.record_id_length = len;
        }
        if let Some(route) = values.get("routes.sign_in") {
            config.sign_in_route = route.to_string();
        }
        if let Some(route) = values.get("routes.preview") {
            config.preview_route = route.to_string();
        }

        Ok(config)
    }

    pub fn with_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_key_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn with_record_id_length(mut self, len: usize) -> Self {
        self.record_id_length = len.max(1);
        self
    }

    /// Share link for a record
    pub fn share_url(&self, id: &str) -> String {
        format!("{}{}", self.base_url, id)
    }

    /// Route the preview redirect goes to
    pub fn preview_path(&self, id: &str) -> String {
        format!("{}{}", self.preview_route, id)
    }
}

/// Storage settings from the `storage.*` keys, on top of [`BlobConfig`] defaults
pub fn blob_config_from(values: &ConfigValues) -> UploadResult<BlobConfig> {
    let mut config = BlobConfig::default();

    if let Some(bytes) = values.parse::<u64>("storage.max_object_bytes")? {
        config = config.with_max_object_bytes(bytes);
    }
    if let Some(bytes) = values.parse::<usize>("storage.chunk_size")? {
        if bytes == 0 {
            return Err(UploadError::config("storage.chunk_size", "must be at least 1"));
        }
        config = config.with_chunk_size(bytes);
    }
    if let Some(url) = values.get("storage.public_base_url") {
        config = config.with_public_base_url(url);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> ConfigValues {
        ConfigValues::from_vars(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            ENV_PREFIX,
        )
    }

    #[test]
    fn env_keys_are_normalized() {
        let values = vars(&[
            ("DROPSHARE__TIMERS__CONFIRM_DELAY_MS", "10"),
            ("DROPSHARE__BASE_URL", "https://s.io/"),
            ("PATH", "/usr/bin"),
        ]);

        assert_eq!(values.get("timers.confirm_delay_ms"), Some("10"));
        assert_eq!(values.get("base_url"), Some("https://s.io/"));
        assert!(!values.has("path"));
    }

    #[test]
    fn defaults_match_upload_page() {
        let config = UploadConfig::from_values(&ConfigValues::new()).unwrap();
        assert_eq!(config.collection, "uploadedFile");
        assert_eq!(config.key_prefix, "file-upload/");
        assert_eq!(config.confirm_delay, Duration::from_secs(2));
        assert_eq!(config.redirect_delay, Duration::from_secs(2));
        assert_eq!(config.record_id_length, 6);
        assert_eq!(config.sign_in_route, "/sign-in");
        assert_eq!(config.preview_path("x1"), "/file-preview/x1");
    }

    #[test]
    fn overrides_are_applied() {
        let values = vars(&[
            ("DROPSHARE__BASE_URL", "https://s.io/f/"),
            ("DROPSHARE__TIMERS__CONFIRM_DELAY_MS", "250"),
            ("DROPSHARE__TIMERS__REDIRECT_DELAY_MS", "500"),
            ("DROPSHARE__RECORD_ID_LENGTH", "12"),
            ("DROPSHARE__STORAGE__KEY_PREFIX", "incoming/"),
        ]);
        let config = UploadConfig::from_values(&values).unwrap();

        assert_eq!(config.share_url("abc"), "https://s.io/f/abc");
        assert_eq!(config.confirm_delay, Duration::from_millis(250));
        assert_eq!(config.redirect_delay, Duration::from_millis(500));
        assert_eq!(config.record_id_length, 12);
        assert_eq!(config.key_prefix, "incoming/");
    }

    #[test]
    fn malformed_numbers_name_the_key() {
        let values = vars(&[("DROPSHARE__TIMERS__CONFIRM_DELAY_MS", "soon")]);
        let err = UploadConfig::from_values(&values).unwrap_err();
        assert!(matches!(err, UploadError::Config { ref key, .. } if key == "timers.confirm_delay_ms"));
    }

    #[test]
    fn zero_id_length_is_rejected() {
        let values = vars(&[("DROPSHARE__RECORD_ID_LENGTH", "0")]);
        assert!(UploadConfig::from_values(&values).is_err());
    }

    #[test]
    fn storage_keys_build_blob_config() {
        let values = vars(&[
            ("DROPSHARE__STORAGE__CHUNK_SIZE", "1024"),
            ("DROPSHARE__STORAGE__MAX_OBJECT_BYTES", "4096"),
            ("DROPSHARE__STORAGE__PUBLIC_BASE_URL", "https://cdn.example.com"),
        ]);
        let blob = blob_config_from(&values).unwrap();

        assert_eq!(blob.chunk_size, 1024);
        assert_eq!(blob.max_object_bytes, 4096);
        assert_eq!(blob.public_base_url, "https://cdn.example.com");

        let zero = vars(&[("DROPSHARE__STORAGE__CHUNK_SIZE", "0")]);
        assert!(blob_config_from(&zero).is_err());
    }
}
