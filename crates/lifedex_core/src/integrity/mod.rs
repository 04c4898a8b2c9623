//! State-integrity layer: repair, invariant checks and schema migration.
//!
//! # Responsibility
//! - Turn arbitrary JSON (storage, imports) into a well-formed `State`.
//! - Re-validate typed drafts produced by mutators.
//! - Adapt documents of older schema revisions before repair.
//!
//! # Invariants
//! - Repair is total: it never fails and never panics.
//! - Repair is idempotent: repairing a repaired document changes nothing.

pub mod invariants;
pub mod migrate;
pub mod repair;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
