//! Optional DRM connectors a subtask may call through.
//!
//! Connectors are opaque executors; an absent connector means the DRM is
//! unsupported on this client and is reported as such, never as a crash.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a DRM connector.
#[derive(Debug, Error)]
#[error("DRM fulfillment failed: {message}")]
pub struct DrmError {
    /// Connector-provided description.
    pub message: String,
}

impl DrmError {
    /// Creates an error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Adobe ACS fulfillment.
#[async_trait]
pub trait AdobeDrmConnector: Send + Sync {
    /// Fulfills an ACSM token, writing the protected book under `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`DrmError`] when the activation or fulfillment fails.
    async fn fulfill(&self, acsm: &[u8], directory: &Path) -> Result<PathBuf, DrmError>;
}

/// The set of installed DRM connectors.
#[derive(Clone, Default)]
pub struct DrmConnectors {
    /// Adobe ACS connector, when installed.
    pub adobe: Option<Arc<dyn AdobeDrmConnector>>,
}

impl DrmConnectors {
    /// No connectors.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Installs an Adobe connector.
    #[must_use]
    pub fn with_adobe(mut self, connector: Arc<dyn AdobeDrmConnector>) -> Self {
        self.adobe = Some(connector);
        self
    }
}

impl fmt::Debug for DrmConnectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrmConnectors")
            .field("adobe", &self.adobe.is_some())
            .finish()
    }
}
