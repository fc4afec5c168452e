//! Audio manifest fulfillment: acquire bytes, parse, license-check.
//!
//! [`ManifestFulfillment::execute`] runs the three steps in order and records
//! each in its own step log. Only the first step touches the network, and
//! with network unavailable it falls back to caller-supplied data. Given the
//! same request and unchanged network conditions it yields the same parsed
//! manifest. Besides emitting events it only writes the optional manifest
//! cache.

mod error;
mod fulfillment;
mod license;
mod parser;
mod strategy;

pub use error::FulfillmentError;
pub use fulfillment::ManifestFulfillment;
pub use license::{EncryptionSchemeCheck, LicenseCheck, LicenseCheckError};
pub use parser::{AudioManifest, ManifestLink, ManifestParser, ParseIssue, ParseResult, ReadiumManifestParser};
pub use strategy::{
    BasicManifestStrategy, ManifestDownloadStrategy, VendorClientCredentials,
    VendorManifestStrategy, select_strategy,
};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use url::Url;

use crate::mime::MimeType;

/// Reports whether the network is reachable.
pub type NetworkProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// Loads previously fetched manifest bytes for offline use.
pub type FallbackLoader = Arc<dyn Fn() -> Option<ManifestFulfilled> + Send + Sync>;

/// Credentials presented when fetching an audio manifest.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioBookCredentials {
    /// Username and password.
    UsernamePassword {
        /// Username or barcode.
        username: String,
        /// Password or PIN.
        password: String,
    },
    /// Username without a password.
    UsernameOnly {
        /// Username or barcode.
        username: String,
    },
    /// Bearer token.
    BearerToken {
        /// Token.
        token: String,
    },
}

impl fmt::Debug for AudioBookCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::UsernameOnly { username } => f
                .debug_struct("UsernameOnly")
                .field("username", username)
                .finish(),
            Self::BearerToken { .. } => f.debug_struct("BearerToken").finish_non_exhaustive(),
        }
    }
}

/// Everything needed to fulfill one audio manifest.
#[derive(Clone)]
pub struct ManifestRequest {
    /// Where the manifest (or fulfillment document) lives.
    pub target: Url,
    /// Declared content type; selects the download strategy.
    pub content_type: MimeType,
    /// User-Agent for manifest requests.
    pub user_agent: String,
    /// Credentials, when the target requires them.
    pub credentials: Option<AudioBookCredentials>,
    /// Network availability probe.
    pub is_network_available: NetworkProbe,
    /// Offline fallback loader.
    pub fallback: Option<FallbackLoader>,
    /// Where fetched manifests are cached.
    pub cache_directory: Option<PathBuf>,
}

impl ManifestRequest {
    /// Creates a request assuming the network is available and no fallback exists.
    #[must_use]
    pub fn new(target: Url, content_type: MimeType, user_agent: impl Into<String>) -> Self {
        Self {
            target,
            content_type,
            user_agent: user_agent.into(),
            credentials: None,
            is_network_available: Arc::new(|| true),
            fallback: None,
            cache_directory: None,
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<AudioBookCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the network probe.
    #[must_use]
    pub fn with_network_probe(mut self, probe: NetworkProbe) -> Self {
        self.is_network_available = probe;
        self
    }

    /// Sets the fallback loader.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<FallbackLoader>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.cache_directory = directory;
        self
    }
}

/// File under `directory` caching the manifest fetched from `target`.
#[must_use]
pub fn manifest_cache_path(directory: &Path, target: &Url) -> PathBuf {
    directory.join(format!(
        "{:x}.json",
        Sha256::digest(target.as_str().as_bytes())
    ))
}

impl fmt::Debug for ManifestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestRequest")
            .field("target", &self.target.as_str())
            .field("content_type", &self.content_type.to_string())
            .field("user_agent", &self.user_agent)
            .field("credentials", &self.credentials)
            .field("has_fallback", &self.fallback.is_some())
            .field("cache_directory", &self.cache_directory)
            .finish_non_exhaustive()
    }
}

/// Raw manifest bytes and their content type.
#[derive(Clone, PartialEq, Eq)]
pub struct ManifestFulfilled {
    /// Content type of `data`.
    pub content_type: MimeType,
    /// Manifest document.
    pub data: Vec<u8>,
}

impl fmt::Debug for ManifestFulfilled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestFulfilled")
            .field("content_type", &self.content_type.to_string())
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A parsed manifest with the bytes it came from, for re-caching.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestData {
    /// Parsed manifest.
    pub manifest: AudioManifest,
    /// Original bytes.
    pub fulfilled: ManifestFulfilled,
}
