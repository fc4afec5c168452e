//! Error types for manifest fulfillment.

use thiserror::Error;

use super::parser::ParseIssue;
use crate::http::HttpError;
use crate::task::ErrorCode;

/// Failures of the manifest fulfillment steps.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The requested strategy cannot run with the available configuration.
    #[error("manifest download is misconfigured: {message}\n  Suggestion: {suggestion}")]
    Configuration {
        /// What is missing.
        message: String,
        /// How to fix it.
        suggestion: &'static str,
    },

    /// A manifest or token request failed.
    #[error("failed to download manifest from {url}: {source}")]
    Download {
        /// URL requested.
        url: String,
        /// Transport error.
        #[source]
        source: HttpError,
    },

    /// The token endpoint answered with something other than a token.
    #[error("invalid token response from {url}: {message}")]
    TokenResponse {
        /// Token endpoint.
        url: String,
        /// What was wrong with the response.
        message: String,
    },

    /// Offline and the caller supplied no fallback data.
    #[error("network unavailable and no fallback data for the manifest")]
    NoFallbackData,

    /// The manifest document could not be parsed.
    #[error("failed to parse manifest: {}", join_issues(.errors))]
    Parse {
        /// Structural errors.
        errors: Vec<ParseIssue>,
    },

    /// A license check rejected the manifest.
    #[error("license check '{check}' failed: {message}")]
    LicenseCheck {
        /// Check name.
        check: &'static str,
        /// Why it failed.
        message: String,
    },
}

impl FulfillmentError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>, suggestion: &'static str) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a download error.
    pub fn download(url: impl Into<String>, source: HttpError) -> Self {
        Self::Download {
            url: url.into(),
            source,
        }
    }

    /// Error code recorded on the failed step.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { .. } => ErrorCode::ManifestConfiguration,
            Self::Download { source, .. } if matches!(source, HttpError::AuthRequired { .. }) => {
                ErrorCode::HttpAuthRequired
            }
            Self::Download { .. } | Self::TokenResponse { .. } => ErrorCode::ManifestDownloadFailed,
            Self::NoFallbackData => ErrorCode::ManifestNoFallback,
            Self::Parse { .. } => ErrorCode::ManifestParseFailed,
            Self::LicenseCheck { .. } => ErrorCode::LicenseCheckFailed,
        }
    }
}

fn join_issues(issues: &[ParseIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
