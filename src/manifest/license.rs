//! License checks run against a parsed manifest before it is usable.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use super::parser::AudioManifest;
use crate::events::{EventSender, PipelineEvent};

/// Why a license check rejected a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LicenseCheckError {
    /// Explanation for the user.
    pub message: String,
}

impl LicenseCheckError {
    /// Creates an error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A pluggable validation pass over a parsed manifest.
#[async_trait]
pub trait LicenseCheck: Send + Sync {
    /// Short name for step messages and events.
    fn name(&self) -> &'static str;

    /// Validates `manifest`, optionally reporting progress on `events`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseCheckError`] when the manifest must not be used.
    async fn check(
        &self,
        manifest: &AudioManifest,
        events: &EventSender,
    ) -> Result<(), LicenseCheckError>;
}

/// Rejects manifests using an encryption scheme this client cannot decrypt.
#[derive(Debug, Clone, Default)]
pub struct EncryptionSchemeCheck {
    supported: HashSet<String>,
}

impl EncryptionSchemeCheck {
    /// Accepts unencrypted content plus the given schemes.
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LicenseCheck for EncryptionSchemeCheck {
    fn name(&self) -> &'static str {
        "encryption-scheme"
    }

    async fn check(
        &self,
        manifest: &AudioManifest,
        events: &EventSender,
    ) -> Result<(), LicenseCheckError> {
        let declared = manifest
            .encryption_scheme
            .iter()
            .chain(
                manifest
                    .reading_order
                    .iter()
                    .filter_map(|link| link.encryption_scheme.as_ref()),
            );

        for scheme in declared {
            if !self.supported.contains(scheme) {
                return Err(LicenseCheckError::new(format!(
                    "encryption scheme '{scheme}' is not supported"
                )));
            }
        }

        events.emit(PipelineEvent::LicenseCheckStatus {
            check: self.name().to_string(),
            message: "All encryption schemes supported".to_string(),
        });
        Ok(())
    }
}
