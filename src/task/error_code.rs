//! Closed set of error codes attached to failed task steps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable classification of a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The borrow request named a profile that does not exist.
    ProfileNotFound,
    /// The profile has no account with the requested ID.
    AccountNotFound,
    /// A book database operation failed.
    DatabaseFailure,
    /// No acquisition path is fully supported by the account.
    NoSupportedAcquisition,
    /// No registered subtask can handle a path element.
    NoSubtaskAvailable,
    /// A subtask panicked instead of returning an error.
    SubtaskUnexpectedFailure,
    /// Catch-all for failures outside any subtask.
    Unexpected,
    /// A path element had no target address when one was required.
    MissingTargetAddress,
    /// An HTTP request failed.
    HttpRequestFailed,
    /// The server demanded credentials the account could not satisfy.
    HttpAuthRequired,
    /// The server returned a different content type than the path expects.
    ContentTypeMismatch,
    /// A response body could not be parsed.
    ResponseParseFailed,
    /// The library reports the publication as unavailable for loan.
    LoanUnavailable,
    /// A DRM connector needed by the path is not installed.
    DrmUnsupported,
    /// A DRM connector failed to fulfill the content.
    DrmFailed,
    /// Bundled content could not be resolved.
    BundledContentMissing,
    /// Manifest bytes could not be downloaded.
    ManifestDownloadFailed,
    /// Offline and no fallback manifest was available.
    ManifestNoFallback,
    /// The manifest download strategy is misconfigured.
    ManifestConfiguration,
    /// The manifest could not be parsed.
    ManifestParseFailed,
    /// A license check rejected the manifest.
    LicenseCheckFailed,
    /// Local file IO failed.
    IoFailure,
}

impl ErrorCode {
    /// Returns the stable string label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileNotFound => "profile_not_found",
            Self::AccountNotFound => "account_not_found",
            Self::DatabaseFailure => "database_failure",
            Self::NoSupportedAcquisition => "no_supported_acquisition",
            Self::NoSubtaskAvailable => "no_subtask_available",
            Self::SubtaskUnexpectedFailure => "subtask_unexpected_failure",
            Self::Unexpected => "unexpected",
            Self::MissingTargetAddress => "missing_target_address",
            Self::HttpRequestFailed => "http_request_failed",
            Self::HttpAuthRequired => "http_auth_required",
            Self::ContentTypeMismatch => "content_type_mismatch",
            Self::ResponseParseFailed => "response_parse_failed",
            Self::LoanUnavailable => "loan_unavailable",
            Self::DrmUnsupported => "drm_unsupported",
            Self::DrmFailed => "drm_failed",
            Self::BundledContentMissing => "bundled_content_missing",
            Self::ManifestDownloadFailed => "manifest_download_failed",
            Self::ManifestNoFallback => "manifest_no_fallback",
            Self::ManifestConfiguration => "manifest_configuration",
            Self::ManifestParseFailed => "manifest_parse_failed",
            Self::LicenseCheckFailed => "license_check_failed",
            Self::IoFailure => "io_failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
