//! Collision-avoiding temporary files for in-flight downloads.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tracing::debug;

use super::error::HttpError;

/// Guesses a file extension from a Content-Type header value.
pub(crate) fn extension_from_content_type(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match mime.as_str() {
        "application/epub+zip" => ".epub",
        "application/pdf" => ".pdf",
        "application/vnd.adobe.adept+xml" => ".acsm",
        "text/html" => ".html",
        "application/json" | "application/audiobook+json" => ".json",
        m if m.ends_with("+json") => ".json",
        m if m.ends_with("+xml") || m == "application/xml" || m == "text/xml" => ".xml",
        _ => ".bin",
    }
}

/// Creates a new, empty temporary file in `directory` with a random name.
///
/// Names are tried at most `attempts` times; an existing file is never reused.
pub(crate) async fn create_temporary_file(
    directory: &Path,
    extension: &str,
    attempts: u32,
) -> Result<(File, PathBuf), HttpError> {
    create_unique_file(directory, attempts, |_| {
        format!("borrow-{:016x}{extension}", rand::random::<u64>())
    })
    .await
}

async fn create_unique_file(
    directory: &Path,
    attempts: u32,
    mut next_name: impl FnMut(u32) -> String,
) -> Result<(File, PathBuf), HttpError> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| HttpError::io(directory.to_path_buf(), e))?;

    for attempt in 0..attempts {
        let path = directory.join(next_name(attempt));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, path)),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), attempt, "temporary file name taken");
            }
            Err(error) => return Err(HttpError::io(path, error)),
        }
    }

    Err(HttpError::TemporaryFileExhausted {
        directory: directory.to_path_buf(),
        attempts,
    })
}
