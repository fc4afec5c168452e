//! Push-only progress events emitted while pipelines run.
//!
//! Events go out on a [`tokio::sync::broadcast`] channel. Sending never waits;
//! with no subscribers an event is simply dropped, and slow subscribers see
//! `RecvError::Lagged` rather than stalling the pipeline.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::book::BookId;

/// Progress and status notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Bytes received for a book download.
    DownloadProgress {
        /// Book being downloaded.
        book_id: BookId,
        /// Bytes received so far.
        received: u64,
        /// Total size, when the server reported one.
        expected: Option<u64>,
        /// Rolling transfer rate.
        bytes_per_second: u64,
    },
    /// Bytes received for an audio manifest.
    ManifestDownloadProgress {
        /// Bytes received so far.
        received: u64,
        /// Total size, when known.
        expected: Option<u64>,
    },
    /// Manifest bytes were obtained.
    ManifestFetched {
        /// Size of the manifest document.
        bytes: usize,
        /// Whether they came from the network or the offline fallback.
        source: ManifestSource,
    },
    /// A license check reported on its progress.
    LicenseCheckStatus {
        /// Name of the check.
        check: String,
        /// Status message.
        message: String,
    },
    /// Free-form status from the manifest fulfillment pipeline.
    FulfillmentStatus {
        /// Status message.
        message: String,
    },
}

/// Where manifest bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestSource {
    /// Downloaded during this run.
    Network,
    /// Supplied by the caller's fallback loader.
    Fallback,
}

/// Cloneable sending half of the event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventSender {
    /// Creates a channel holding at most `capacity` undelivered events.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emits an event without waiting for subscribers.
    pub fn emit(&self, event: PipelineEvent) {
        // send() fails only when nobody is listening
        self.tx.send(event).ok();
    }
}
