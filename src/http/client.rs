//! HTTP client wrapper with streaming downloads into temporary files.

use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::HttpError;
use super::filename::{create_temporary_file, extension_from_content_type};
use super::{DownloadProgress, DownloadedFile, HttpAuth, HttpMethod, HttpRequest, HttpResponse};
use crate::cancel::CancellationFlag;
use crate::config::BorrowConfig;
use crate::mime::MimeType;

/// Minimum interval between progress callbacks.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// HTTP client shared by every borrow a set of services runs.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    temporary_directory: std::path::PathBuf,
    temporary_file_attempts: u32,
}

impl HttpClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ClientBuild`] if the underlying client cannot be built.
    pub fn new(config: &BorrowConfig) -> Result<Self, HttpError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .user_agent(config.effective_user_agent())
            .build()
            .map_err(|source| HttpError::ClientBuild { source })?;
        Ok(Self {
            client,
            temporary_directory: config.temporary_directory.clone(),
            temporary_file_attempts: config.temporary_file_attempts,
        })
    }

    /// Sends a request and returns the response with its body unread.
    ///
    /// Non-success statuses are errors; 401, 403 and 407 become
    /// [`HttpError::AuthRequired`].
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on network failure, timeout or error status.
    #[instrument(skip(self, request), fields(url = %request.url, method = ?request.method))]
    pub async fn send(&self, request: HttpRequest) -> Result<HttpStream, HttpError> {
        let url = request.url.to_string();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(request.url.clone()),
            HttpMethod::Post => self.client.post(request.url.clone()),
        };
        builder = match request.auth {
            Some(HttpAuth::Basic { username, password }) => builder.basic_auth(username, password),
            Some(HttpAuth::Bearer { token }) => builder.bearer_auth(token),
            None => builder,
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((content_type, body)) = request.body {
            builder = builder.header(CONTENT_TYPE, content_type).body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::timeout(url.clone())
            } else {
                HttpError::network(url.clone(), e)
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            if matches!(status, 401 | 403 | 407) {
                let domain = request
                    .url
                    .host_str()
                    .map_or_else(|| url.clone(), ToString::to_string);
                return Err(HttpError::auth_required(url, status, domain));
            }
            return Err(HttpError::http_status(url, status));
        }

        debug!(status, "response received");
        Ok(HttpStream { response })
    }

    /// Sends a request and reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`send`](Self::send), plus network errors while
    /// reading the body.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.send(request).await?.into_response().await
    }

    /// Sends a request and streams the body into a new temporary file.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`send`](Self::send) and of
    /// [`HttpStream::save_to_temporary_file`].
    pub async fn download_to_temporary_file(
        &self,
        request: HttpRequest,
        cancel: &CancellationFlag,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> Result<DownloadedFile, HttpError> {
        self.send(request)
            .await?
            .save_to_temporary_file(self, cancel, on_progress)
            .await
    }

    pub(crate) fn temporary_directory(&self) -> &Path {
        &self.temporary_directory
    }
}

/// A successful response whose body has not been read yet.
#[derive(Debug)]
pub struct HttpStream {
    response: reqwest::Response,
}

impl HttpStream {
    /// Final URL after redirects.
    #[must_use]
    pub fn url(&self) -> &Url {
        self.response.url()
    }

    /// Status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    /// Parsed Content-Type, when present and valid.
    #[must_use]
    pub fn content_type(&self) -> Option<MimeType> {
        self.response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| MimeType::parse(value).ok())
    }

    /// Declared Content-Length.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the body cannot be read.
    pub async fn into_response(self) -> Result<HttpResponse, HttpError> {
        let url = self.url().clone();
        let status = self.status();
        let content_type = self.content_type();
        let body = self
            .response
            .bytes()
            .await
            .map_err(|e| HttpError::network(url.as_str(), e))?;
        Ok(HttpResponse {
            status,
            url,
            content_type,
            body: body.to_vec(),
        })
    }

    /// Streams the body into a new temporary file.
    ///
    /// Cancellation is polled between chunks; a cancelled or failed transfer
    /// removes the partial file. Progress is reported at most every 250ms,
    /// plus once at completion.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Cancelled`] when `cancel` is set mid-transfer,
    /// [`HttpError::TemporaryFileExhausted`] when no file name is free, and
    /// network or IO errors otherwise.
    #[instrument(skip_all, fields(url = %self.url()))]
    pub async fn save_to_temporary_file(
        self,
        client: &HttpClient,
        cancel: &CancellationFlag,
        on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
    ) -> Result<DownloadedFile, HttpError> {
        let url = self.url().to_string();
        let content_type = self.content_type();
        let content_length = self.content_length();
        let extension = content_type
            .as_ref()
            .map_or(".bin", |mime| extension_from_content_type(&mime.full_type()));

        let (file, path) = create_temporary_file(
            client.temporary_directory(),
            extension,
            client.temporary_file_attempts,
        )
        .await?;

        let result = stream_body(
            file,
            self.response,
            &url,
            &path,
            content_length,
            cancel,
            on_progress,
        )
        .await;

        match result {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "body saved");
                Ok(DownloadedFile {
                    path,
                    content_type,
                    bytes,
                    content_length,
                })
            }
            Err(error) => {
                debug!(path = %path.display(), "removing partial file");
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %cleanup, "failed to remove partial file");
                }
                Err(error)
            }
        }
    }
}

async fn stream_body(
    file: tokio::fs::File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    expected: Option<u64>,
    cancel: &CancellationFlag,
    on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
) -> Result<u64, HttpError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let started = Instant::now();
    let mut last_report: Option<Instant> = None;
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled {
                url: url.to_string(),
            });
        }
        let chunk = chunk.map_err(|e| HttpError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| HttpError::io(path.to_path_buf(), e))?;
        received += chunk.len() as u64;

        if last_report.is_none_or(|at| at.elapsed() >= PROGRESS_INTERVAL) {
            on_progress(progress(received, expected, started));
            last_report = Some(Instant::now());
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| HttpError::io(path.to_path_buf(), e))?;
    on_progress(progress(received, expected, started));
    Ok(received)
}

fn progress(received: u64, expected: Option<u64>, started: Instant) -> DownloadProgress {
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX).max(1);
    DownloadProgress {
        received,
        expected,
        bytes_per_second: received.saturating_mul(1000) / elapsed_ms,
    }
}
