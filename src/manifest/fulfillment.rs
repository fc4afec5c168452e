//! The download, parse and license-check pipeline.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::error::FulfillmentError;
use super::license::LicenseCheck;
use super::parser::{ManifestParser, ParseResult, ReadiumManifestParser};
use super::strategy::{VendorClientCredentials, select_strategy};
use super::{ManifestData, ManifestFulfilled, ManifestRequest, manifest_cache_path};
use crate::events::{EventSender, ManifestSource, PipelineEvent};
use crate::http::HttpClient;
use crate::task::{StepCause, TaskRecorder, TaskResult};

/// Runs manifest fulfillment for requests.
///
/// Holds only configuration; each [`execute`](Self::execute) call owns its
/// own step log, so one value can serve any number of requests.
#[derive(Clone)]
pub struct ManifestFulfillment {
    http: HttpClient,
    events: EventSender,
    parser: Arc<dyn ManifestParser>,
    extensions: Vec<String>,
    license_checks: Vec<Arc<dyn LicenseCheck>>,
    vendor_client: Option<VendorClientCredentials>,
}

impl std::fmt::Debug for ManifestFulfillment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestFulfillment")
            .field("extensions", &self.extensions)
            .field("license_checks", &self.license_checks.len())
            .field("vendor_client", &self.vendor_client)
            .finish_non_exhaustive()
    }
}

impl ManifestFulfillment {
    /// Creates a pipeline with the Readium parser and no license checks.
    #[must_use]
    pub fn new(http: HttpClient, events: EventSender) -> Self {
        Self {
            http,
            events,
            parser: Arc::new(ReadiumManifestParser),
            extensions: Vec::new(),
            license_checks: Vec::new(),
            vendor_client: None,
        }
    }

    /// Replaces the parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn ManifestParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Declares metadata extension namespaces the parser preserves.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Adds a license check; checks run in insertion order.
    #[must_use]
    pub fn with_license_check(mut self, check: Arc<dyn LicenseCheck>) -> Self {
        self.license_checks.push(check);
        self
    }

    /// Sets the vendor OAuth client.
    #[must_use]
    pub fn with_vendor_client(mut self, client: Option<VendorClientCredentials>) -> Self {
        self.vendor_client = client;
        self
    }

    /// Acquires, parses and license-checks the manifest for `request`.
    ///
    /// Every step is recorded; the first failing step ends the run.
    #[instrument(skip_all, fields(target = %request.target, content_type = %request.content_type))]
    pub async fn execute(&self, request: &ManifestRequest) -> TaskResult<ManifestData> {
        let mut recorder = TaskRecorder::new();

        recorder.begin_new_step("Acquiring manifest");
        let fulfilled = match self.acquire(request).await {
            Ok((fulfilled, message)) => {
                recorder.current_step_succeeded(message);
                fulfilled
            }
            Err(error) => return fail(&mut recorder, error),
        };

        recorder.begin_new_step("Parsing manifest");
        let manifest = match self.parser.parse(&fulfilled.data, &self.extensions) {
            ParseResult::Success { result, warnings } => {
                for warning in &warnings {
                    warn!(path = %warning.path, message = %warning.message, "manifest parse warning");
                }
                recorder.current_step_succeeded(format!(
                    "Parsed manifest with {} reading order items",
                    result.reading_order.len()
                ));
                result
            }
            ParseResult::Failure { errors, warnings } => {
                for warning in &warnings {
                    warn!(path = %warning.path, message = %warning.message, "manifest parse warning");
                }
                return fail(&mut recorder, FulfillmentError::Parse { errors });
            }
        };

        recorder.begin_new_step("Checking manifest licenses");
        for check in &self.license_checks {
            self.events.emit(PipelineEvent::LicenseCheckStatus {
                check: check.name().to_string(),
                message: "Running license check".to_string(),
            });
            if let Err(error) = check.check(&manifest, &self.events).await {
                return fail(
                    &mut recorder,
                    FulfillmentError::LicenseCheck {
                        check: check.name(),
                        message: error.message,
                    },
                );
            }
        }
        recorder.current_step_succeeded(format!(
            "{} license checks passed",
            self.license_checks.len()
        ));

        info!(
            segments = manifest.reading_order.len(),
            bytes = fulfilled.data.len(),
            "manifest fulfilled"
        );
        self.events.emit(PipelineEvent::FulfillmentStatus {
            message: "Manifest fulfilled".to_string(),
        });
        recorder.finish_success(ManifestData {
            manifest,
            fulfilled,
        })
    }

    async fn acquire(
        &self,
        request: &ManifestRequest,
    ) -> Result<(ManifestFulfilled, String), FulfillmentError> {
        if !(request.is_network_available)() {
            let fulfilled = request
                .fallback
                .as_ref()
                .and_then(|load| load())
                .ok_or(FulfillmentError::NoFallbackData)?;
            self.events.emit(PipelineEvent::ManifestFetched {
                bytes: fulfilled.data.len(),
                source: ManifestSource::Fallback,
            });
            return Ok((fulfilled, "Network unavailable; loaded fallback manifest".to_string()));
        }

        let strategy = select_strategy(request, self.vendor_client.as_ref())?;
        self.events.emit(PipelineEvent::FulfillmentStatus {
            message: format!("Downloading manifest using {} strategy", strategy.name()),
        });
        let fulfilled = strategy.fetch(&self.http, request, &self.events).await?;
        self.events.emit(PipelineEvent::ManifestFetched {
            bytes: fulfilled.data.len(),
            source: ManifestSource::Network,
        });
        if let Some(directory) = &request.cache_directory {
            write_cache(directory, request, &fulfilled).await;
        }
        let message = format!(
            "Downloaded {} bytes using {} strategy",
            fulfilled.data.len(),
            strategy.name()
        );
        Ok((fulfilled, message))
    }
}

/// Best effort; a failed cache write only loses offline fallback.
async fn write_cache(directory: &Path, request: &ManifestRequest, fulfilled: &ManifestFulfilled) {
    let path = manifest_cache_path(directory, &request.target);
    let written = match tokio::fs::create_dir_all(directory).await {
        Ok(()) => tokio::fs::write(&path, &fulfilled.data).await,
        Err(error) => Err(error),
    };
    match written {
        Ok(()) => debug!(path = %path.display(), "manifest cached"),
        Err(error) => warn!(path = %path.display(), error = %error, "failed to cache manifest"),
    }
}

fn fail<T>(recorder: &mut TaskRecorder, error: FulfillmentError) -> TaskResult<T> {
    let code = error.code();
    let message = match &error {
        FulfillmentError::Parse { errors } => {
            let mut message = "Failed to parse manifest".to_string();
            for issue in errors {
                message.push_str("\n  ");
                message.push_str(&issue.to_string());
            }
            message
        }
        FulfillmentError::NoFallbackData => {
            "No network connection and no fallback data available".to_string()
        }
        other => other.to_string(),
    };
    let cause: Option<StepCause> = match error {
        FulfillmentError::Download { source, .. } => Some(Arc::new(source)),
        _ => None,
    };
    recorder.current_step_failed(message, code, cause);
    recorder.finish_failure()
}
