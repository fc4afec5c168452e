//! Runtime configuration for borrow execution.
//!
//! All fields have defaults, so an empty JSON object is a valid config.
//! Values outside their documented ranges are rejected by
//! [`BorrowConfig::validate`] rather than clamped.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::manifest::VendorClientCredentials;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Default whole-request timeout in seconds (large files need headroom).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;
/// Default bound on temporary file naming attempts.
pub const DEFAULT_TEMPORARY_FILE_ATTEMPTS: u32 = 100;
/// Default capacity of the pipeline event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for this schema.
    #[error("failed to parse borrow configuration: {source}\n  Suggestion: Check the JSON syntax and field names.")]
    Parse {
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },

    /// A field value is outside its allowed range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Field name as written in the config.
        field: &'static str,
        /// Rejected value, rendered.
        value: String,
        /// Human-readable allowed range.
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Configuration shared by every borrow a set of services runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BorrowConfig {
    /// TCP connect timeout.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout, including body streaming.
    pub read_timeout_secs: u64,
    /// Overrides the crate's default User-Agent.
    pub user_agent: Option<String>,
    /// Where in-flight downloads are written.
    pub temporary_directory: PathBuf,
    /// Where fetched audio manifests are cached for offline fallback.
    pub manifest_cache_directory: Option<PathBuf>,
    /// OAuth client for the vendor audiobook manifest strategy.
    pub vendor_audio_client: Option<VendorClientCredentials>,
    /// Bound on collision-avoiding temporary file naming attempts.
    pub temporary_file_attempts: u32,
    /// Capacity of the pipeline event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for BorrowConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            user_agent: None,
            temporary_directory: std::env::temp_dir(),
            manifest_cache_directory: None,
            vendor_audio_client: None,
            temporary_file_attempts: DEFAULT_TEMPORARY_FILE_ATTEMPTS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl BorrowConfig {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if !(1..=10_000).contains(&self.temporary_file_attempts) {
            return Err(ConfigError::invalid(
                "temporary_file_attempts",
                self.temporary_file_attempts,
                "range 1..=10000",
            ));
        }
        if !(1..=65_536).contains(&self.event_channel_capacity) {
            return Err(ConfigError::invalid(
                "event_channel_capacity",
                self.event_channel_capacity,
                "range 1..=65536",
            ));
        }
        if let Some(agent) = &self.user_agent
            && agent.trim().is_empty()
        {
            return Err(ConfigError::invalid(
                "user_agent",
                "\"\"",
                "a non-empty string",
            ));
        }
        if let Some(vendor) = &self.vendor_audio_client
            && (vendor.client_key.trim().is_empty() || vendor.client_secret.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "vendor_audio_client",
                "<redacted>",
                "a non-empty client_key and client_secret",
            ));
        }
        Ok(())
    }

    /// Effective User-Agent header value.
    #[must_use]
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(crate::http::default_user_agent)
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "range 1..=3600"));
    }
    Ok(())
}
