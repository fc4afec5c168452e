//! Collaborators shared by every borrow.

use std::sync::Arc;

use thiserror::Error;

use super::registry::SubtaskRegistry;
use super::subtasks::build_default_subtask_registry;
use crate::account::ProfileDirectory;
use crate::book::BookRegistry;
use crate::bundled::BundledContentResolver;
use crate::clock::{Clock, SystemClock};
use crate::config::{BorrowConfig, ConfigError};
use crate::drm::DrmConnectors;
use crate::events::EventSender;
use crate::http::{HttpClient, HttpError};
use crate::manifest::{ManifestFulfillment, NetworkProbe};

/// Errors building [`BorrowServices`].
#[derive(Debug, Error)]
pub enum ServicesError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Everything a borrow pipeline needs besides its request.
///
/// Built once and shared behind an [`Arc`] by any number of concurrent
/// borrows.
pub struct BorrowServices {
    /// Validated configuration.
    pub config: BorrowConfig,
    /// Shared HTTP client.
    pub http: HttpClient,
    /// Profile lookup.
    pub profiles: Arc<dyn ProfileDirectory>,
    /// Book status sink.
    pub book_registry: Arc<dyn BookRegistry>,
    /// Element-to-subtask dispatch table.
    pub subtasks: Arc<SubtaskRegistry>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Progress event channel.
    pub events: EventSender,
    /// Installed DRM connectors.
    pub drm: DrmConnectors,
    /// Resolver for bundled content, if the client ships any.
    pub bundled: Option<Arc<dyn BundledContentResolver>>,
    /// Reports whether the network is reachable.
    pub network_probe: NetworkProbe,
    /// Audio manifest fulfillment.
    pub manifest: ManifestFulfillment,
}

impl BorrowServices {
    /// Builds services with the default subtask registry.
    ///
    /// # Errors
    ///
    /// Returns [`ServicesError`] when the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(
        config: BorrowConfig,
        profiles: Arc<dyn ProfileDirectory>,
        book_registry: Arc<dyn BookRegistry>,
    ) -> Result<Self, ServicesError> {
        config.validate()?;
        let http = HttpClient::new(&config)?;
        let events = EventSender::new(config.event_channel_capacity);
        let manifest = ManifestFulfillment::new(http.clone(), events.clone())
            .with_vendor_client(config.vendor_audio_client.clone());

        Ok(Self {
            config,
            http,
            profiles,
            book_registry,
            subtasks: Arc::new(build_default_subtask_registry()),
            clock: Arc::new(SystemClock),
            events,
            drm: DrmConnectors::none(),
            bundled: None,
            network_probe: Arc::new(|| true),
            manifest,
        })
    }

    /// Replaces the subtask registry.
    #[must_use]
    pub fn with_subtasks(mut self, subtasks: SubtaskRegistry) -> Self {
        self.subtasks = Arc::new(subtasks);
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Installs DRM connectors.
    #[must_use]
    pub fn with_drm(mut self, drm: DrmConnectors) -> Self {
        self.drm = drm;
        self
    }

    /// Installs a bundled content resolver.
    #[must_use]
    pub fn with_bundled(mut self, bundled: Arc<dyn BundledContentResolver>) -> Self {
        self.bundled = Some(bundled);
        self
    }

    /// Replaces the network probe.
    #[must_use]
    pub fn with_network_probe(mut self, probe: NetworkProbe) -> Self {
        self.network_probe = probe;
        self
    }

    /// Adjusts the manifest pipeline, e.g. to add license checks.
    #[must_use]
    pub fn with_manifest(
        mut self,
        configure: impl FnOnce(ManifestFulfillment) -> ManifestFulfillment,
    ) -> Self {
        self.manifest = configure(self.manifest);
        self
    }
}

impl std::fmt::Debug for BorrowServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorrowServices")
            .field("config", &self.config)
            .field("subtasks", &self.subtasks)
            .field("drm", &self.drm)
            .field("bundled", &self.bundled.is_some())
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::InMemoryProfileDirectory;
    use crate::book::InMemoryBookRegistry;

    #[test]
    fn test_invalid_config_rejected() {
        let config = BorrowConfig {
            temporary_file_attempts: 0,
            ..BorrowConfig::default()
        };
        let err = BorrowServices::new(
            config,
            Arc::new(InMemoryProfileDirectory::default()),
            Arc::new(InMemoryBookRegistry::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ServicesError::Config(_)));
    }

    #[test]
    fn test_default_registry_installed() {
        let services = BorrowServices::new(
            BorrowConfig::default(),
            Arc::new(InMemoryProfileDirectory::default()),
            Arc::new(InMemoryBookRegistry::new()),
        )
        .unwrap();
        assert!(!services.subtasks.is_empty());
        assert!((services.network_probe)());
    }
}
