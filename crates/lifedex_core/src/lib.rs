//! Core state-integrity layer for LifeDex progress tracking.
//! This crate is the single source of truth for document invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod integrity;
pub mod logging;
pub mod model;
pub mod persist;
pub mod service;
pub mod store;
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use config::PersistenceConfig;
pub use integrity::migrate::{migrate, stamp_current, Migrated};
pub use integrity::repair::{repair, repair_state, RepairIssue, Repaired};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entry::{Attachment, LogEntry, TimelineEntry};
pub use model::state::{default_seed, Category, State, Tracker, TrackerId};
pub use persist::WriteOutcome;
pub use service::{
    AddXpRequest, ImportError, ProgressSession, ServiceError, ServiceResult,
};
pub use store::{KeyValueStore, SqliteKvStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
