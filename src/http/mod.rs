//! HTTP transport used by subtasks and manifest download strategies.
//!
//! A thin wrapper over `reqwest` exposing one request/response shape, plus
//! streaming of large bodies into collision-safe temporary files with
//! cooperative cancellation and progress callbacks.

mod client;
mod error;
mod filename;
mod user_agent;

pub use client::{HttpClient, HttpStream};
pub use error::HttpError;
pub use user_agent::default_user_agent;

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::mime::MimeType;

/// Request methods the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
}

/// Authorization attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    /// HTTP Basic.
    Basic {
        /// Username.
        username: String,
        /// Password, if any.
        password: Option<String>,
    },
    /// `Authorization: Bearer`.
    Bearer {
        /// Token.
        token: String,
    },
}

impl fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Target.
    pub url: Url,
    /// Authorization, if any.
    pub auth: Option<HttpAuth>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Body and its content type.
    pub body: Option<(String, Vec<u8>)>,
}

impl HttpRequest {
    /// A GET request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            auth: None,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST with an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn post_form(url: Url, fields: &[(&str, &str)]) -> Self {
        let body = fields
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        Self {
            method: HttpMethod::Post,
            url,
            auth: None,
            headers: Vec::new(),
            body: Some((
                "application/x-www-form-urlencoded".to_string(),
                body.into_bytes(),
            )),
        }
    }

    /// Sets the authorization.
    #[must_use]
    pub fn with_auth(mut self, auth: Option<HttpAuth>) -> Self {
        self.auth = auth;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Final URL after redirects.
    pub url: Url,
    /// Parsed Content-Type, when present and valid.
    pub content_type: Option<MimeType>,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// Progress of a streaming download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub received: u64,
    /// Total size from Content-Length, when sent.
    pub expected: Option<u64>,
    /// Average rate since the transfer started.
    pub bytes_per_second: u64,
}

/// A body saved to a temporary file.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Where the body was written.
    pub path: PathBuf,
    /// Content type the server declared.
    pub content_type: Option<MimeType>,
    /// Bytes written.
    pub bytes: u64,
    /// Content-Length the server declared.
    pub content_length: Option<u64>,
}
