//! Root aggregate and tracker records.
//!
//! # Responsibility
//! - Define `State`, `Tracker`, `TrackerId` and `Category`.
//! - Provide lookup helpers that tolerate missing trackers.
//!
//! # Invariants
//! - Tracker ids are stable and never reused once generated.
//! - `State` is mutated only through the session commit pipeline.

use crate::model::career::CareerTree;
use crate::model::entry::{LogEntry, TimelineEntry};
use crate::model::CURRENT_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable tracker identifier.
///
/// Imported documents may carry arbitrary non-empty strings; ids minted by
/// this crate are UUID v4 strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerId(String);

impl TrackerId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for TrackerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TrackerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for TrackerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Closed set of tracker categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Skill,
    Career,
    Trait,
    Hobby,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Skill, Self::Career, Self::Trait, Self::Hobby];

    /// Stable wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skill => "Skill",
            Self::Career => "Career",
            Self::Trait => "Trait",
            Self::Hobby => "Hobby",
        }
    }

    /// Parses the exact wire string. Case variants are not accepted.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == value)
    }
}

/// One progress category accumulating XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    pub id: TrackerId,
    pub name: String,
    pub category: Category,
    /// Never negative after repair.
    pub xp: i64,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_tree: Option<CareerTree>,
}

impl Tracker {
    /// Creates an empty tracker with a generated id.
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            id: TrackerId::generate(),
            name: name.into(),
            category,
            xp: 0,
            log: Vec::new(),
            career_tree: None,
        }
    }

    pub fn with_xp(mut self, xp: i64) -> Self {
        self.xp = xp;
        self
    }
}

/// Root persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub schema_version: u32,
    #[serde(default)]
    pub trackers: Vec<Tracker>,
    /// Newest first.
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            trackers: Vec::new(),
            timeline: Vec::new(),
        }
    }
}

impl State {
    pub fn tracker(&self, id: &TrackerId) -> Option<&Tracker> {
        self.trackers.iter().find(|tracker| &tracker.id == id)
    }

    pub fn tracker_mut(&mut self, id: &TrackerId) -> Option<&mut Tracker> {
        self.trackers.iter_mut().find(|tracker| &tracker.id == id)
    }

    /// Sum of XP across all trackers.
    pub fn total_xp(&self) -> i64 {
        self.trackers
            .iter()
            .fold(0, |total, tracker| total.saturating_add(tracker.xp))
    }
}

/// Starter document used when nothing valid is stored.
pub fn default_seed() -> State {
    State {
        schema_version: CURRENT_SCHEMA_VERSION,
        trackers: vec![
            Tracker::new("LifeDoc", Category::Skill).with_xp(95),
            Tracker::new("BlueCollar Trades", Category::Career).with_xp(20),
            Tracker::new("Reliability", Category::Trait).with_xp(40),
            Tracker::new("Artistry", Category::Hobby).with_xp(5),
        ],
        timeline: Vec::new(),
    }
}
