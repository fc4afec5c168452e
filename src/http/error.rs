//! Error types for the HTTP layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while sending requests or saving response bodies.
#[derive(Debug, Error)]
pub enum HttpError {
    /// DNS, connection, TLS or body read failure.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// URL being requested.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete in time.
    #[error("timeout requesting {url}")]
    Timeout {
        /// URL that timed out.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// URL that failed.
        url: String,
        /// Status code.
        status: u16,
    },

    /// The server demands credentials the request did not satisfy.
    #[error(
        "[AUTH] authentication required for {domain} (HTTP {status}) requesting {url}\n  Suggestion: {suggestion}"
    )]
    AuthRequired {
        /// URL that demanded authentication.
        url: String,
        /// Status code (401, 403 or 407).
        status: u16,
        /// Host requiring authentication.
        domain: String,
        /// What the user can do about it.
        suggestion: &'static str,
    },

    /// Writing the response body failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// Rejected URL.
        url: String,
    },

    /// Every temporary file name tried was taken.
    #[error(
        "could not create a temporary file in {directory} after {attempts} attempts\n  Suggestion: Clear stale downloads from the temporary directory."
    )]
    TemporaryFileExhausted {
        /// Directory searched.
        directory: PathBuf,
        /// Number of names tried.
        attempts: u32,
    },

    /// The download was cancelled while streaming.
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// URL being downloaded.
        url: String,
    },

    /// The underlying client could not be built.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// Builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl HttpError {
    /// Creates a network error from a client error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an authentication-required error.
    ///
    /// 407 points at proxy settings; anything else at the library sign-in.
    pub fn auth_required(url: impl Into<String>, status: u16, domain: impl Into<String>) -> Self {
        let suggestion = if status == 407 {
            "Configure your HTTP proxy settings or check proxy credentials."
        } else {
            "Sign in to the library account again."
        };
        Self::AuthRequired {
            url: url.into(),
            status,
            domain: domain.into(),
            suggestion,
        }
    }

    /// Returns true for the cancellation variant.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let msg = HttpError::http_status("https://library.example/loans", 500).to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("https://library.example/loans"), "{msg}");
    }

    #[test]
    fn test_auth_required_suggestion_depends_on_status() {
        let proxy = HttpError::auth_required("https://a.example", 407, "a.example").to_string();
        assert!(proxy.contains("proxy"), "{proxy}");
        let login = HttpError::auth_required("https://a.example", 401, "a.example").to_string();
        assert!(login.contains("Sign in"), "{login}");
        assert!(login.contains("[AUTH]"), "{login}");
    }

    #[test]
    fn test_temporary_file_exhausted_display() {
        let msg = HttpError::TemporaryFileExhausted {
            directory: PathBuf::from("/tmp/borrow"),
            attempts: 3,
        }
        .to_string();
        assert!(msg.contains("3 attempts"), "{msg}");
        assert!(msg.contains("Suggestion:"), "{msg}");
    }
}
