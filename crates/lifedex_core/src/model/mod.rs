//! Domain model for trackers, activity entries and undo snapshots.
//!
//! # Responsibility
//! - Define the canonical in-memory shape of the persisted document.
//! - Keep wire naming (camelCase JSON) in one place via serde attributes.
//!
//! # Invariants
//! - Values of these types are only guaranteed well-formed after a pass
//!   through `integrity::repair`.
//! - `TimelineEntry::tracker_id` is a weak reference and may dangle.

pub mod career;
pub mod entry;
pub mod history;
pub mod state;

/// Current persisted document revision.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;
/// Maximum number of timeline entries retained (newest first).
pub const MAX_TIMELINE: usize = 300;
/// Maximum number of undo snapshots retained.
pub const MAX_HISTORY: usize = 25;
/// Maximum attachments per entry.
pub const MAX_ATTACHMENTS: usize = 3;
/// Upper bound for a declared attachment size in bytes.
pub const MAX_ATTACHMENT_SIZE: u64 = 50_000_000;
/// Upper bound (encoded characters) for an embedded attachment payload.
pub const MAX_EMBEDDED_PAYLOAD_LEN: usize = 1_200_000;
/// Upper bound for the derived semantic XP bonus.
pub const MAX_SEMANTIC_XP: i64 = 25;
