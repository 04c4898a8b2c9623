//! Activity entries and attachment metadata.
//!
//! # Responsibility
//! - Define the per-tracker `LogEntry` and the denormalized `TimelineEntry`.
//! - Define attachment records as accepted from the attachment collaborator.
//!
//! # Invariants
//! - After repair, each entry has non-empty `text` or non-zero `xp`.
//! - After repair, each entry carries at most `MAX_ATTACHMENTS` attachments.

use crate::model::state::{Category, State, Tracker, TrackerId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENTRY_KIND: &str = "note";
pub const DEFAULT_VERIFICATION_STATUS: &str = "unverified";
pub const DEFAULT_ATTACHMENT_NAME: &str = "Attachment";

/// Attachment metadata with an optional embedded payload token.
///
/// The core never produces `embedded_payload` itself; it only keeps or
/// discards what the attachment collaborator supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_payload: Option<String>,
}

impl Attachment {
    /// Metadata-only attachment.
    pub fn metadata(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            embedded_payload: None,
        }
    }
}

/// One activity record owned by a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub text: String,
    /// Signed XP delta this entry contributed.
    pub xp: i64,
    /// Derived keyword bonus in `[0, MAX_SEMANTIC_XP]`.
    pub semantic_xp: i64,
    pub entry_kind: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub verification_status: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, xp: i64, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            xp,
            semantic_xp: 0,
            entry_kind: DEFAULT_ENTRY_KIND.to_string(),
            attachments: Vec::new(),
            verification_status: DEFAULT_VERIFICATION_STATUS.to_string(),
            timestamp,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.entry_kind = kind.into();
        self
    }

    /// Invariant 5: an entry must say something or move XP.
    pub fn is_meaningful(&self) -> bool {
        !self.text.trim().is_empty() || self.xp != 0
    }
}

/// Timeline projection of a log entry across all trackers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// Weak back-reference; the tracker may have been deleted since.
    pub tracker_id: Option<TrackerId>,
    /// Tracker name at the time the entry was recorded.
    #[serde(default)]
    pub tracker_name: String,
    #[serde(default)]
    pub tracker_category: Category,
    #[serde(flatten)]
    pub entry: LogEntry,
}

impl TimelineEntry {
    /// Projects a log entry for the given tracker.
    pub fn project(tracker: &Tracker, entry: &LogEntry) -> Self {
        Self {
            tracker_id: Some(tracker.id.clone()),
            tracker_name: tracker.name.clone(),
            tracker_category: tracker.category,
            entry: entry.clone(),
        }
    }

    /// Resolves the referenced tracker, if it still exists.
    pub fn tracker<'a>(&self, state: &'a State) -> Option<&'a Tracker> {
        self.tracker_id.as_ref().and_then(|id| state.tracker(id))
    }
}
