//! Observable lifecycle of a book during and after borrowing.

use chrono::{DateTime, Utc};
use url::Url;

use super::Book;
use crate::catalog::Availability;
use crate::task::TaskResult;

/// Current state of a book as observers see it.
///
/// Published on every transition; the pipeline never reads it back.
#[derive(Debug, Clone)]
pub enum BookStatus {
    /// A borrow has started.
    RequestingDownload,
    /// A loan is being requested from the library.
    RequestingLoan,
    /// The library placed a hold instead of lending.
    Held {
        /// Position in the hold queue, if reported.
        position: Option<u32>,
    },
    /// Content is being downloaded.
    Downloading {
        /// Bytes received so far.
        received: u64,
        /// Total size, when known.
        expected: Option<u64>,
        /// Rolling transfer rate.
        bytes_per_second: u64,
    },
    /// The download needs the user to sign in through a browser first.
    DownloadWaitingForExternalAuthentication {
        /// Page to open for signing in.
        url: Url,
    },
    /// The loan request failed.
    FailedLoan {
        /// Full step log of the failed run.
        result: TaskResult<()>,
    },
    /// The download failed after any loan was obtained.
    FailedDownload {
        /// Full step log of the failed run.
        result: TaskResult<()>,
    },
    /// Terminal state derived from the finished book.
    Available {
        /// Whether local content exists.
        downloaded: bool,
        /// End of the loan, when the entry is on loan.
        loan_expiry: Option<DateTime<Utc>>,
    },
}

impl BookStatus {
    /// Derives the resting status of a book from its catalog entry and formats.
    #[must_use]
    pub fn from_book(book: &Book) -> Self {
        match &book.entry.availability {
            Availability::Reserved { position } if !book.is_downloaded() => Self::Held {
                position: *position,
            },
            _ => Self::Available {
                downloaded: book.is_downloaded(),
                loan_expiry: book.entry.loan_expiry(),
            },
        }
    }

    /// Returns true for either failed state.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::FailedLoan { .. } | Self::FailedDownload { .. })
    }

    /// Short label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestingDownload => "requesting_download",
            Self::RequestingLoan => "requesting_loan",
            Self::Held { .. } => "held",
            Self::Downloading { .. } => "downloading",
            Self::DownloadWaitingForExternalAuthentication { .. } => {
                "download_waiting_for_external_authentication"
            }
            Self::FailedLoan { .. } => "failed_loan",
            Self::FailedDownload { .. } => "failed_download",
            Self::Available { .. } => "available",
        }
    }
}
