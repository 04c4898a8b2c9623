//! Core use-case services.
//!
//! # Responsibility
//! - Own the live `State` and route every mutation through the commit
//!   pipeline (`session`).
//! - Expose tracker-level actions built on that pipeline (`tracker_ops`).
//! - Keep CLI and other callers decoupled from storage details.
//!
//! # Invariants
//! - Persistence failures never surface as `ServiceError`; they are reported
//!   as a `WriteOutcome` value.
//! - Only import and caller mistakes (unknown ids, empty names, locked
//!   milestones) produce errors.

pub mod scoring;
pub mod session;
pub mod tracker_ops;

use crate::model::state::TrackerId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use scoring::{KeywordScorer, SemanticScorer};
pub use session::ProgressSession;
pub use tracker_ops::AddXpRequest;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Reasons an imported document is rejected as a whole.
#[derive(Debug)]
pub enum ImportError {
    Parse(serde_json::Error),
    NotAnObject,
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "import is not valid JSON: {err}"),
            Self::NotAnObject => write!(f, "import is not a document object"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug)]
pub enum ServiceError {
    TrackerNotFound(TrackerId),
    InvalidName,
    CareerNodeNotFound { tracker: TrackerId, node: String },
    CareerNodeLocked { tracker: TrackerId, node: String },
    Import(ImportError),
    Export(serde_json::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrackerNotFound(id) => write!(f, "tracker not found: {id}"),
            Self::InvalidName => write!(f, "tracker name must not be empty"),
            Self::CareerNodeNotFound { tracker, node } => {
                write!(f, "career node `{node}` not found on tracker {tracker}")
            }
            Self::CareerNodeLocked { tracker, node } => write!(
                f,
                "career node `{node}` on tracker {tracker} is locked by unfinished prerequisites"
            ),
            Self::Import(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "failed to encode export: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Import(err) => Some(err),
            Self::Export(err) => Some(err),
            Self::TrackerNotFound(_)
            | Self::InvalidName
            | Self::CareerNodeNotFound { .. }
            | Self::CareerNodeLocked { .. } => None,
        }
    }
}

impl From<ImportError> for ServiceError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}
