//! Data models for kosync
//!
//! Defines the progress records exchanged with the sync service and the
//! local record the engine keeps for debouncing.

use serde::{Deserialize, Serialize};

use crate::identity::DocumentId;

/// Convert a page position into a completion ratio
///
/// Returns 0.0 when `total_pages` is not positive, otherwise
/// `page / total_pages` clamped to `[0.0, 1.0]`.
pub fn percentage(page: i64, total_pages: i64) -> f64 {
    if total_pages <= 0 {
        return 0.0;
    }
    (page as f64 / total_pages as f64).clamp(0.0, 1.0)
}

/// Last successful push for a document, as seen by this engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalProgressRecord {
    /// Document key
    pub document: DocumentId,
    /// Page that was pushed
    pub page: i64,
    /// Total pages at push time
    pub total_pages: i64,
    /// When the push was accepted (seconds since epoch)
    pub last_push: i64,
}

/// Progress record as stored by the sync service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProgress {
    /// Document key (echoed back by the service)
    #[serde(default)]
    pub document: String,
    /// Position as the pushing device encoded it (a page number for us)
    pub progress: String,
    /// Completion ratio in `[0, 1]`
    pub percentage: f64,
    /// Identifier of the device that pushed this record
    #[serde(default)]
    pub device_id: String,
    /// Human-readable device name
    #[serde(default)]
    pub device: String,
    /// Server-side update time (seconds since epoch)
    #[serde(default)]
    pub timestamp: i64,
}

impl RemoteProgress {
    /// Page number encoded in `progress`, if it is a plain decimal integer
    ///
    /// Positions written by other clients (e.g. XPointers) yield `None`.
    pub fn page(&self) -> Option<i64> {
        let progress = self.progress.as_str();
        if progress.is_empty() || !progress.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        progress.parse().ok()
    }
}

/// Body of `PUT /syncs/progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub progress: String,
    pub percentage: f64,
    pub device_id: String,
    pub document: String,
    pub device: String,
}

impl ProgressPayload {
    /// Build the payload for a page position
    pub fn for_page(
        document: &DocumentId,
        page: i64,
        total_pages: i64,
        device_id: &str,
        device: &str,
    ) -> Self {
        Self {
            progress: page.to_string(),
            percentage: percentage(page, total_pages),
            device_id: device_id.to_string(),
            document: document.to_string(),
            device: device.to_string(),
        }
    }
}
