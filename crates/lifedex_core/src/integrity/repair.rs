//! Total normalization of raw or typed documents into a valid `State`.
//!
//! # Responsibility
//! - Read arbitrary JSON leniently (wrong types, legacy field names, junk
//!   elements) into the typed model.
//! - Enforce every document invariant by defaulting, clamping or dropping.
//! - Report each dropped or coerced fragment as a `RepairIssue`.
//!
//! # Invariants
//! - `repair` never fails; the worst input yields an empty document.
//! - First occurrence of a tracker id wins; later duplicates get fresh ids.
//! - Timeline is truncated to the first `MAX_TIMELINE` entries (newest first).
//! - Repairing the serialized output of a repair yields `Repaired::Valid`.
//!
//! # See also
//! - `integrity::invariants` for the checks this module guarantees.

use crate::integrity::invariants;
use crate::integrity::now_epoch_ms;
use crate::model::career::{CareerNode, CareerTree, DEFAULT_NODE_GROUP, DEFAULT_NODE_TITLE};
use crate::model::entry::{
    Attachment, LogEntry, TimelineEntry, DEFAULT_ATTACHMENT_NAME, DEFAULT_ENTRY_KIND,
    DEFAULT_VERIFICATION_STATUS,
};
use crate::model::state::{Category, State, Tracker, TrackerId};
use crate::model::{
    CURRENT_SCHEMA_VERSION, MAX_ATTACHMENTS, MAX_ATTACHMENT_SIZE, MAX_EMBEDDED_PAYLOAD_LEN,
    MAX_SEMANTIC_XP, MAX_TIMELINE,
};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const DEFAULT_TRACKER_NAME: &str = "Untitled";
const MAX_ATTACHMENT_NAME_CHARS: usize = 120;
const MAX_ATTACHMENT_TYPE_CHARS: usize = 80;

static EMBEDDED_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:[\w.+-]*(/[\w.+-]+)?(;[\w.+-]+(=[\w.+-]+)?)*,")
        .expect("valid embedded token regex")
});

/// Position of a fragment in the input document.
///
/// Indices refer to input order, before any entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Document,
    Tracker(usize),
    Log { tracker: usize, entry: usize },
    Timeline(usize),
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Tracker(index) => write!(f, "tracker #{index}"),
            Self::Log { tracker, entry } => write!(f, "tracker #{tracker} log entry #{entry}"),
            Self::Timeline(index) => write!(f, "timeline entry #{index}"),
        }
    }
}

/// One fragment of input that repair dropped or coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairIssue {
    /// Root value was not a JSON object; an empty document was produced.
    DocumentNotAnObject,
    /// A list field was absent or not an array; it was replaced by `[]`.
    NotAnArray { at: Location, field: &'static str },
    /// A tracker element was not an object; it was rebuilt from defaults.
    TrackerRebuilt { index: usize },
    /// Tracker id was missing or already used earlier in the document.
    TrackerIdReplaced { index: usize, previous: String },
    /// A scalar field was missing, mistyped or out of range and was defaulted.
    FieldCoerced { at: Location, field: &'static str },
    /// Entry had no text and zero xp.
    EntryDropped { at: Location },
    /// Oldest timeline entries beyond `MAX_TIMELINE` were dropped.
    TimelineTruncated { dropped: usize },
    /// An attachment element was not an object.
    AttachmentDropped { at: Location, attachment: usize },
    /// Attachments beyond `MAX_ATTACHMENTS` were dropped.
    AttachmentsTruncated { at: Location, dropped: usize },
    /// Embedded payload did not look like a data token or was too large.
    PayloadDiscarded { at: Location, attachment: usize },
}

/// Result of a repair pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repaired {
    /// Input was already well-formed; nothing was changed.
    Valid(State),
    /// Input was normalized; the issues list every change made.
    PartiallyRecovered(State, Vec<RepairIssue>),
}

impl Repaired {
    fn from_parts(state: State, issues: Vec<RepairIssue>) -> Self {
        debug_assert!(
            invariants::check(&state).is_empty(),
            "repair produced an invalid state"
        );
        if issues.is_empty() {
            Self::Valid(state)
        } else {
            debug!(
                "event=repair module=integrity status=degraded issues={}",
                issues.len()
            );
            Self::PartiallyRecovered(state, issues)
        }
    }

    pub fn state(&self) -> &State {
        match self {
            Self::Valid(state) | Self::PartiallyRecovered(state, _) => state,
        }
    }

    pub fn into_state(self) -> State {
        match self {
            Self::Valid(state) | Self::PartiallyRecovered(state, _) => state,
        }
    }

    pub fn issues(&self) -> &[RepairIssue] {
        match self {
            Self::Valid(_) => &[],
            Self::PartiallyRecovered(_, issues) => issues.as_slice(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Repairs an arbitrary JSON value into a well-formed state.
pub fn repair(raw: &Value) -> Repaired {
    repair_at(raw, now_epoch_ms())
}

/// Same as [`repair`], with an explicit "now" for defaulted timestamps.
pub fn repair_at(raw: &Value, now_ms: i64) -> Repaired {
    let mut issues = Vec::new();
    let state = read_state(raw, &mut issues);
    let state = normalize_state(state, now_ms, &mut issues);
    Repaired::from_parts(state, issues)
}

/// Re-validates an already typed document, e.g. a mutated draft.
pub fn repair_state(state: State) -> Repaired {
    repair_state_at(state, now_epoch_ms())
}

pub fn repair_state_at(state: State, now_ms: i64) -> Repaired {
    let mut issues = Vec::new();
    let state = normalize_state(state, now_ms, &mut issues);
    Repaired::from_parts(state, issues)
}

/// Whether a payload looks like an embedded data token (`data:<mime>[;..],`).
pub fn is_embedded_token(payload: &str) -> bool {
    payload.len() <= MAX_EMBEDDED_PAYLOAD_LEN && EMBEDDED_TOKEN_RE.is_match(payload)
}

// ---------------------------------------------------------------------------
// Typed normalization
// ---------------------------------------------------------------------------

fn normalize_state(mut state: State, now_ms: i64, issues: &mut Vec<RepairIssue>) -> State {
    if state.schema_version == 0 {
        state.schema_version = CURRENT_SCHEMA_VERSION;
        issues.push(RepairIssue::FieldCoerced {
            at: Location::Document,
            field: "schemaVersion",
        });
    }

    let mut seen: HashSet<TrackerId> = HashSet::with_capacity(state.trackers.len());
    for (index, tracker) in state.trackers.iter_mut().enumerate() {
        normalize_tracker(tracker, index, &mut seen, now_ms, issues);
    }

    let mut index = 0;
    state.timeline.retain_mut(|item| {
        let at = Location::Timeline(index);
        index += 1;
        if item.tracker_id.as_ref().is_some_and(TrackerId::is_empty) {
            item.tracker_id = None;
            issues.push(RepairIssue::FieldCoerced {
                at,
                field: "trackerId",
            });
        }
        keep_entry(&mut item.entry, at, now_ms, issues)
    });

    if state.timeline.len() > MAX_TIMELINE {
        let dropped = state.timeline.len() - MAX_TIMELINE;
        state.timeline.truncate(MAX_TIMELINE);
        issues.push(RepairIssue::TimelineTruncated { dropped });
    }

    state
}

fn normalize_tracker(
    tracker: &mut Tracker,
    index: usize,
    seen: &mut HashSet<TrackerId>,
    now_ms: i64,
    issues: &mut Vec<RepairIssue>,
) {
    if tracker.id.is_empty() || seen.contains(&tracker.id) {
        let mut fresh = TrackerId::generate();
        while seen.contains(&fresh) {
            fresh = TrackerId::generate();
        }
        let previous = std::mem::replace(&mut tracker.id, fresh);
        issues.push(RepairIssue::TrackerIdReplaced {
            index,
            previous: previous.to_string(),
        });
    }
    seen.insert(tracker.id.clone());

    let at = Location::Tracker(index);
    let trimmed = tracker.name.trim();
    if trimmed.is_empty() {
        tracker.name = DEFAULT_TRACKER_NAME.to_string();
        issues.push(RepairIssue::FieldCoerced { at, field: "name" });
    } else if trimmed.len() != tracker.name.len() {
        tracker.name = trimmed.to_string();
        issues.push(RepairIssue::FieldCoerced { at, field: "name" });
    }

    if tracker.xp < 0 {
        tracker.xp = 0;
        issues.push(RepairIssue::FieldCoerced { at, field: "xp" });
    }

    let mut entry_index = 0;
    tracker.log.retain_mut(|entry| {
        let at = Location::Log {
            tracker: index,
            entry: entry_index,
        };
        entry_index += 1;
        keep_entry(entry, at, now_ms, issues)
    });

    if let Some(tree) = tracker.career_tree.as_mut() {
        if normalize_career_tree(tree) {
            issues.push(RepairIssue::FieldCoerced {
                at,
                field: "careerTree",
            });
        }
    }
}

/// Normalizes one entry in place and reports whether it should be kept.
fn keep_entry(
    entry: &mut LogEntry,
    at: Location,
    now_ms: i64,
    issues: &mut Vec<RepairIssue>,
) -> bool {
    let trimmed = entry.text.trim();
    if trimmed.len() != entry.text.len() {
        entry.text = trimmed.to_string();
        issues.push(RepairIssue::FieldCoerced { at, field: "text" });
    }

    let clamped = entry.semantic_xp.clamp(0, MAX_SEMANTIC_XP);
    if clamped != entry.semantic_xp {
        entry.semantic_xp = clamped;
        issues.push(RepairIssue::FieldCoerced {
            at,
            field: "semanticXp",
        });
    }

    if entry.entry_kind.trim().is_empty() {
        entry.entry_kind = DEFAULT_ENTRY_KIND.to_string();
        issues.push(RepairIssue::FieldCoerced {
            at,
            field: "entryKind",
        });
    }

    if entry.verification_status.trim().is_empty() {
        entry.verification_status = DEFAULT_VERIFICATION_STATUS.to_string();
        issues.push(RepairIssue::FieldCoerced {
            at,
            field: "verificationStatus",
        });
    }

    if entry.timestamp <= 0 {
        entry.timestamp = now_ms;
        issues.push(RepairIssue::FieldCoerced {
            at,
            field: "timestamp",
        });
    }

    normalize_attachments(&mut entry.attachments, at, issues);

    if entry.is_meaningful() {
        true
    } else {
        issues.push(RepairIssue::EntryDropped { at });
        false
    }
}

fn normalize_attachments(
    attachments: &mut Vec<Attachment>,
    at: Location,
    issues: &mut Vec<RepairIssue>,
) {
    if attachments.len() > MAX_ATTACHMENTS {
        let dropped = attachments.len() - MAX_ATTACHMENTS;
        attachments.truncate(MAX_ATTACHMENTS);
        issues.push(RepairIssue::AttachmentsTruncated { at, dropped });
    }

    for (index, attachment) in attachments.iter_mut().enumerate() {
        let mut coerced = false;
        if attachment.name.chars().count() > MAX_ATTACHMENT_NAME_CHARS {
            attachment.name = attachment
                .name
                .chars()
                .take(MAX_ATTACHMENT_NAME_CHARS)
                .collect();
            coerced = true;
        }
        if attachment.name.is_empty() {
            attachment.name = DEFAULT_ATTACHMENT_NAME.to_string();
            coerced = true;
        }
        if attachment.mime_type.chars().count() > MAX_ATTACHMENT_TYPE_CHARS {
            attachment.mime_type = attachment
                .mime_type
                .chars()
                .take(MAX_ATTACHMENT_TYPE_CHARS)
                .collect();
            coerced = true;
        }
        if attachment.size > MAX_ATTACHMENT_SIZE {
            attachment.size = MAX_ATTACHMENT_SIZE;
            coerced = true;
        }
        if coerced {
            issues.push(RepairIssue::FieldCoerced {
                at,
                field: "attachments",
            });
        }

        let keep_payload = attachment
            .embedded_payload
            .as_deref()
            .map_or(true, is_embedded_token);
        if !keep_payload {
            attachment.embedded_payload = None;
            issues.push(RepairIssue::PayloadDiscarded {
                at,
                attachment: index,
            });
        }
    }
}

/// Returns whether anything in the tree was changed.
fn normalize_career_tree(tree: &mut CareerTree) -> bool {
    let mut changed = false;
    for node in &mut tree.nodes {
        if node.id.trim().is_empty() {
            node.id = Uuid::new_v4().to_string();
            changed = true;
        }
        if node.group.trim().is_empty() {
            node.group = DEFAULT_NODE_GROUP.to_string();
            changed = true;
        }
        if node.title.trim().is_empty() {
            node.title = DEFAULT_NODE_TITLE.to_string();
            changed = true;
        }
        let before = node.requires.len();
        node.requires.retain(|required| !required.trim().is_empty());
        changed |= node.requires.len() != before;
    }
    changed
}

// ---------------------------------------------------------------------------
// Lenient JSON reading
//
// Readers only convert types. Fields whose fallback is a sentinel handled by
// normalization (ids, names, kinds, timestamps) are read silently; fields
// whose fallback is final are reported here.
// ---------------------------------------------------------------------------

fn read_state(raw: &Value, issues: &mut Vec<RepairIssue>) -> State {
    let Some(object) = raw.as_object() else {
        issues.push(RepairIssue::DocumentNotAnObject);
        return State::default();
    };

    let schema_version = match field(object, &["schemaVersion", "version"]) {
        None => CURRENT_SCHEMA_VERSION,
        Some(value) => match read_schema_version(value) {
            Some(version) => version,
            None => {
                issues.push(RepairIssue::FieldCoerced {
                    at: Location::Document,
                    field: "schemaVersion",
                });
                CURRENT_SCHEMA_VERSION
            }
        },
    };

    let trackers = read_array(
        object,
        &["trackers", "dexes"],
        Location::Document,
        "trackers",
        issues,
    )
    .iter()
    .enumerate()
    .map(|(index, value)| read_tracker(value, index, issues))
    .collect();

    let timeline = read_array(
        object,
        &["timeline"],
        Location::Document,
        "timeline",
        issues,
    )
    .iter()
    .enumerate()
    .map(|(index, value)| read_timeline_entry(value, Location::Timeline(index), issues))
    .collect();

    State {
        schema_version,
        trackers,
        timeline,
    }
}

fn read_tracker(value: &Value, index: usize, issues: &mut Vec<RepairIssue>) -> Tracker {
    let Some(object) = value.as_object() else {
        issues.push(RepairIssue::TrackerRebuilt { index });
        return Tracker {
            id: TrackerId::from(""),
            name: String::new(),
            category: Category::default(),
            xp: 0,
            log: Vec::new(),
            career_tree: None,
        };
    };
    let at = Location::Tracker(index);

    let log = read_array(object, &["log"], at, "log", issues)
        .iter()
        .enumerate()
        .map(|(entry, value)| {
            read_entry(
                value,
                Location::Log {
                    tracker: index,
                    entry,
                },
                issues,
            )
        })
        .collect();

    let career_tree = field(object, &["careerTree"]).and_then(|value| {
        let tree = read_career_tree(value);
        if tree.is_none() {
            issues.push(RepairIssue::FieldCoerced {
                at,
                field: "careerTree",
            });
        }
        tree
    });

    Tracker {
        id: TrackerId::from(read_string(field(object, &["id"])).unwrap_or_default()),
        name: read_string(field(object, &["name"])).unwrap_or_default(),
        category: read_category(field(object, &["category", "type"]), at, "category", issues),
        xp: read_reported_int(object, &["xp"], at, "xp", issues),
        log,
        career_tree,
    }
}

fn read_entry(value: &Value, at: Location, issues: &mut Vec<RepairIssue>) -> LogEntry {
    let Some(object) = value.as_object() else {
        // Empty entries are dropped (and reported) during normalization.
        return LogEntry {
            text: String::new(),
            xp: 0,
            semantic_xp: 0,
            entry_kind: DEFAULT_ENTRY_KIND.to_string(),
            attachments: Vec::new(),
            verification_status: DEFAULT_VERIFICATION_STATUS.to_string(),
            timestamp: 0,
        };
    };

    let verification_status = read_string(field(object, &["verificationStatus"]))
        .or_else(|| {
            field(object, &["verification"])
                .and_then(Value::as_object)
                .and_then(|nested| read_string(field(nested, &["status"])))
        })
        .unwrap_or_default();

    LogEntry {
        text: read_string(field(object, &["text"])).unwrap_or_default(),
        xp: read_reported_int(object, &["xp"], at, "xp", issues),
        semantic_xp: read_reported_int(
            object,
            &["semanticXp", "semanticXP"],
            at,
            "semanticXp",
            issues,
        ),
        entry_kind: read_string(field(object, &["entryKind", "entryType", "type", "kind"]))
            .unwrap_or_default(),
        attachments: read_attachments(field(object, &["attachments"]), at, issues),
        verification_status,
        timestamp: read_int(field(object, &["timestamp", "ts"])).unwrap_or(0),
    }
}

fn read_timeline_entry(value: &Value, at: Location, issues: &mut Vec<RepairIssue>) -> TimelineEntry {
    let entry = read_entry(value, at, issues);
    let Some(object) = value.as_object() else {
        return TimelineEntry {
            tracker_id: None,
            tracker_name: String::new(),
            tracker_category: Category::default(),
            entry,
        };
    };

    TimelineEntry {
        tracker_id: read_string(field(object, &["trackerId", "dexId"]))
            .filter(|id| !id.trim().is_empty())
            .map(TrackerId::from),
        tracker_name: read_string(field(object, &["trackerName", "dex"])).unwrap_or_default(),
        tracker_category: read_category(
            field(object, &["trackerCategory", "dexType"]),
            at,
            "trackerCategory",
            issues,
        ),
        entry,
    }
}

fn read_attachments(
    value: Option<&Value>,
    at: Location,
    issues: &mut Vec<RepairIssue>,
) -> Vec<Attachment> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        issues.push(RepairIssue::NotAnArray {
            at,
            field: "attachments",
        });
        return Vec::new();
    };

    let mut attachments = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            issues.push(RepairIssue::AttachmentDropped {
                at,
                attachment: index,
            });
            continue;
        };
        let size = match read_int(field(object, &["size"])) {
            Some(size) if size >= 0 => u64::try_from(size).unwrap_or(0),
            _ => {
                issues.push(RepairIssue::FieldCoerced {
                    at,
                    field: "attachments",
                });
                0
            }
        };
        attachments.push(Attachment {
            name: read_string(field(object, &["name"])).unwrap_or_default(),
            mime_type: read_string(field(object, &["type"])).unwrap_or_default(),
            size,
            embedded_payload: read_string(field(object, &["embeddedPayload", "dataUrl"]))
                .filter(|payload| !payload.is_empty()),
        });
    }
    attachments
}

/// Lenient career tree reader shared with tree attachment from documents.
pub(crate) fn read_career_tree(value: &Value) -> Option<CareerTree> {
    let object = value.as_object()?;
    let nodes = field(object, &["nodes"])
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(read_career_node).collect())
        .unwrap_or_default();
    Some(CareerTree {
        career_preset_id: read_string(field(object, &["careerPresetId"])).unwrap_or_default(),
        title: read_string(field(object, &["title"])).unwrap_or_default(),
        nodes,
    })
}

fn read_career_node(value: &Value) -> Option<CareerNode> {
    let object = value.as_object()?;
    let requires = field(object, &["requires"])
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| read_string(Some(item))).collect())
        .unwrap_or_default();
    Some(CareerNode {
        id: read_string(field(object, &["id"])).unwrap_or_default(),
        group: read_string(field(object, &["group"])).unwrap_or_default(),
        title: read_string(field(object, &["title"])).unwrap_or_default(),
        desc: read_string(field(object, &["desc"])).unwrap_or_default(),
        xp: read_int(field(object, &["xp"])).unwrap_or(0),
        requires,
        done: field(object, &["done"])
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// First non-null value among `names`. Null reads as absent.
fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| object.get(*name).filter(|value| !value.is_null()))
}

fn read_array<'a>(
    object: &'a Map<String, Value>,
    names: &[&str],
    at: Location,
    field_name: &'static str,
    issues: &mut Vec<RepairIssue>,
) -> &'a [Value] {
    match field(object, names).and_then(Value::as_array) {
        Some(items) => items.as_slice(),
        None => {
            issues.push(RepairIssue::NotAnArray {
                at,
                field: field_name,
            });
            &[]
        }
    }
}

fn read_category(
    value: Option<&Value>,
    at: Location,
    field_name: &'static str,
    issues: &mut Vec<RepairIssue>,
) -> Category {
    match value.and_then(Value::as_str).and_then(Category::parse) {
        Some(category) => category,
        None => {
            issues.push(RepairIssue::FieldCoerced {
                at,
                field: field_name,
            });
            Category::default()
        }
    }
}

fn read_reported_int(
    object: &Map<String, Value>,
    names: &[&str],
    at: Location,
    field_name: &'static str,
    issues: &mut Vec<RepairIssue>,
) -> i64 {
    read_int(field(object, names)).unwrap_or_else(|| {
        issues.push(RepairIssue::FieldCoerced {
            at,
            field: field_name,
        });
        0
    })
}

/// Integers, finite floats (truncated) and numeric strings.
fn read_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number.as_i64().or_else(|| finite_to_i64(number.as_f64()?)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| finite_to_i64(text.parse::<f64>().ok()?))
        }
        _ => None,
    }
}

/// Positive document revision, read as leniently as any other integer.
pub(crate) fn read_schema_version(value: &Value) -> Option<u32> {
    read_int(Some(value))
        .and_then(|version| u32::try_from(version).ok())
        .filter(|version| *version > 0)
}

fn finite_to_i64(value: f64) -> Option<i64> {
    // `as` saturates at the i64 bounds.
    value.is_finite().then(|| value.trunc() as i64)
}

fn read_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
