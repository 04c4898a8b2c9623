//! Checks for the document invariants that repair guarantees.
//!
//! Category validity is enforced by the `Category` type itself and has no
//! runtime check here.

use crate::integrity::repair::Location;
use crate::model::state::State;
use crate::model::{MAX_ATTACHMENTS, MAX_TIMELINE};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    EmptyTrackerId { index: usize },
    DuplicateTrackerId { index: usize, id: String },
    NegativeXp { index: usize, xp: i64 },
    EmptyEntry { at: Location },
    TimelineTooLong { len: usize },
    TooManyAttachments { at: Location, count: usize },
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTrackerId { index } => write!(f, "tracker #{index} has an empty id"),
            Self::DuplicateTrackerId { index, id } => {
                write!(f, "tracker #{index} reuses id `{id}`")
            }
            Self::NegativeXp { index, xp } => write!(f, "tracker #{index} has negative xp {xp}"),
            Self::EmptyEntry { at } => write!(f, "{at} has no text and zero xp"),
            Self::TimelineTooLong { len } => {
                write!(f, "timeline holds {len} entries (max {MAX_TIMELINE})")
            }
            Self::TooManyAttachments { at, count } => {
                write!(f, "{at} holds {count} attachments (max {MAX_ATTACHMENTS})")
            }
        }
    }
}

/// Returns every invariant the state currently breaks; empty when valid.
pub fn check(state: &State) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let mut seen = HashSet::new();

    for (index, tracker) in state.trackers.iter().enumerate() {
        if tracker.id.is_empty() {
            violations.push(InvariantViolation::EmptyTrackerId { index });
        } else if !seen.insert(tracker.id.as_str()) {
            violations.push(InvariantViolation::DuplicateTrackerId {
                index,
                id: tracker.id.to_string(),
            });
        }
        if tracker.xp < 0 {
            violations.push(InvariantViolation::NegativeXp {
                index,
                xp: tracker.xp,
            });
        }
        for (entry_index, entry) in tracker.log.iter().enumerate() {
            let at = Location::Log {
                tracker: index,
                entry: entry_index,
            };
            if !entry.is_meaningful() {
                violations.push(InvariantViolation::EmptyEntry { at });
            }
            if entry.attachments.len() > MAX_ATTACHMENTS {
                violations.push(InvariantViolation::TooManyAttachments {
                    at,
                    count: entry.attachments.len(),
                });
            }
        }
    }

    if state.timeline.len() > MAX_TIMELINE {
        violations.push(InvariantViolation::TimelineTooLong {
            len: state.timeline.len(),
        });
    }
    for (index, item) in state.timeline.iter().enumerate() {
        let at = Location::Timeline(index);
        if !item.entry.is_meaningful() {
            violations.push(InvariantViolation::EmptyEntry { at });
        }
        if item.entry.attachments.len() > MAX_ATTACHMENTS {
            violations.push(InvariantViolation::TooManyAttachments {
                at,
                count: item.entry.attachments.len(),
            });
        }
    }

    violations
}
