use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON body of an IndexNow submission.
///
/// Field names follow the IndexNow protocol (`keyLocation`, `urlList`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    /// Site host the URLs belong to
    pub host: String,
    /// IndexNow key
    pub key: String,
    /// Public URL of the key file
    pub key_location: String,
    /// Normalized URLs in this batch
    pub url_list: Vec<String>,
}

/// Snapshot of the pending set, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Number of pending targets
    pub size: usize,
    /// Pending normalized targets, sorted
    pub urls: Vec<String>,
    /// Whether submission is configured at all
    pub enabled: bool,
    /// Wall-clock time the last flush finished
    pub last_flush_at: Option<DateTime<Utc>>,
}

/// Request body for queueing URLs through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    pub urls: Vec<String>,
}

/// Response for an accepted ping request.
///
/// `accepted` counts targets that passed host validation; delivery itself
/// happens in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingAccepted {
    pub accepted: usize,
    pub rejected: Vec<String>,
}
