//! Schema-version-aware adaptation of loaded documents.
//!
//! # Responsibility
//! - Reject values that are not documents at all.
//! - Run the ordered transform chain for the document's revision, then repair.
//!
//! # Invariants
//! - A document without `schemaVersion` is pre-versioning and is stamped
//!   with `CURRENT_SCHEMA_VERSION`.
//! - A document with a version keeps that version (advanced only by the
//!   transform steps actually applied); callers re-stamp explicitly.
//! - Steps run in ascending `from_version` order; each lifts the document
//!   by exactly one revision.

use crate::integrity::now_epoch_ms;
use crate::integrity::repair::{read_schema_version, repair_at, Repaired};
use crate::model::state::State;
use crate::model::CURRENT_SCHEMA_VERSION;
use log::debug;
use serde_json::{Map, Value};

/// One transform lifting a raw document from `from_version` to `from_version + 1`.
#[derive(Debug, Clone, Copy)]
pub struct MigrationStep {
    pub from_version: u32,
    pub apply: fn(&mut Map<String, Value>),
}

/// Registered transforms. Empty while only one document revision exists.
pub const MIGRATION_STEPS: &[MigrationStep] = &[];

/// Result of a successful migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migrated {
    pub state: State,
    /// Version read from the envelope, or `None` for pre-versioning documents.
    pub read_version: Option<u32>,
    /// Number of transform steps applied.
    pub steps_applied: usize,
    /// Outcome of the repair pass run after the transforms.
    pub repaired_cleanly: bool,
}

/// Migrates with the registered chain. Returns `None` only for non-objects.
pub fn migrate(loaded: &Value) -> Option<Migrated> {
    migrate_with(loaded, MIGRATION_STEPS, now_epoch_ms())
}

/// Migrates with an explicit chain and clock.
pub fn migrate_with(loaded: &Value, steps: &[MigrationStep], now_ms: i64) -> Option<Migrated> {
    let object = loaded.as_object()?;

    let Some(raw_version) = version_field(object) else {
        let repaired = repair_at(loaded, now_ms);
        let repaired_cleanly = repaired.is_valid();
        let mut state = repaired.into_state();
        state.schema_version = CURRENT_SCHEMA_VERSION;
        debug!("event=migrate module=integrity status=ok from=unversioned");
        return Some(Migrated {
            state,
            read_version: None,
            steps_applied: 0,
            repaired_cleanly,
        });
    };

    let read_version = coerce_version(raw_version);
    let mut body = object.clone();
    let mut version = read_version;
    let mut steps_applied = 0;

    let mut ordered: Vec<&MigrationStep> = steps.iter().collect();
    ordered.sort_by_key(|step| step.from_version);
    for step in ordered {
        if step.from_version != version {
            continue;
        }
        (step.apply)(&mut body);
        version += 1;
        steps_applied += 1;
    }

    let repaired: Repaired = repair_at(&Value::Object(body), now_ms);
    let repaired_cleanly = repaired.is_valid();
    let mut state = repaired.into_state();
    state.schema_version = version;

    debug!(
        "event=migrate module=integrity status=ok from={} to={} steps={}",
        read_version, version, steps_applied
    );

    Some(Migrated {
        state,
        read_version: Some(read_version),
        steps_applied,
        repaired_cleanly,
    })
}

/// Re-stamps a migrated document to the current revision.
pub fn stamp_current(mut state: State) -> State {
    state.schema_version = CURRENT_SCHEMA_VERSION;
    state
}

fn version_field(object: &Map<String, Value>) -> Option<&Value> {
    ["schemaVersion", "version"]
        .iter()
        .find_map(|name| object.get(*name))
}

fn coerce_version(value: &Value) -> u32 {
    read_schema_version(value).unwrap_or(CURRENT_SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::{migrate, migrate_with, stamp_current, MigrationStep};
    use crate::integrity::repair::repair_at;
    use crate::model::CURRENT_SCHEMA_VERSION;
    use serde_json::{json, Map, Value};

    const NOW: i64 = 1_700_000_000_000;

    fn rename_points_to_xp(body: &mut Map<String, Value>) {
        if let Some(Value::Array(trackers)) = body.get_mut("trackers") {
            for tracker in trackers.iter_mut().filter_map(Value::as_object_mut) {
                if let Some(points) = tracker.remove("points") {
                    tracker.insert("xp".to_string(), points);
                }
            }
        }
    }

    fn double_xp(body: &mut Map<String, Value>) {
        if let Some(Value::Array(trackers)) = body.get_mut("trackers") {
            for tracker in trackers.iter_mut().filter_map(Value::as_object_mut) {
                let xp = tracker.get("xp").and_then(Value::as_i64).unwrap_or(0);
                tracker.insert("xp".to_string(), json!(xp * 2));
            }
        }
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(migrate(&json!("text")).is_none());
        assert!(migrate(&json!(null)).is_none());
        assert!(migrate(&json!([])).is_none());
    }

    #[test]
    fn unversioned_documents_are_stamped_current() {
        let migrated = migrate(&json!({ "trackers": [{ "name": "x", "xp": -5 }] }))
            .expect("object should migrate");
        assert_eq!(migrated.read_version, None);
        assert_eq!(migrated.state.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(migrated.state.trackers[0].xp, 0);
        assert!(!migrated.repaired_cleanly);
    }

    #[test]
    fn read_version_is_kept_not_bumped() {
        let migrated = migrate(&json!({ "schemaVersion": 1, "trackers": [], "timeline": [] }))
            .expect("object should migrate");
        assert_eq!(migrated.read_version, Some(1));
        assert_eq!(migrated.state.schema_version, 1);
        assert_eq!(stamp_current(migrated.state).schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn whole_float_and_numeric_string_versions_are_kept() {
        for version in [json!(2.0), json!("2"), json!(" 2.5 ")] {
            let raw = json!({ "schemaVersion": version, "trackers": [], "timeline": [] });
            let migrated = migrate(&raw).expect("object should migrate");
            assert_eq!(migrated.read_version, Some(2));
            assert_eq!(migrated.state.schema_version, 2);
            assert_eq!(
                repair_at(&raw, NOW).state().schema_version,
                migrated.state.schema_version
            );
        }
    }

    #[test]
    fn non_numeric_version_coerces_to_current() {
        let migrated = migrate(&json!({ "schemaVersion": "banana", "trackers": [] }))
            .expect("object should migrate");
        assert_eq!(migrated.state.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn chain_runs_in_order_from_read_version() {
        let steps = [
            MigrationStep {
                from_version: 2,
                apply: double_xp,
            },
            MigrationStep {
                from_version: 1,
                apply: rename_points_to_xp,
            },
        ];
        let raw = json!({
            "schemaVersion": 1,
            "trackers": [{ "id": "a", "name": "A", "category": "Skill", "points": 21, "log": [] }],
            "timeline": []
        });

        let migrated = migrate_with(&raw, &steps, NOW).expect("object should migrate");
        assert_eq!(migrated.steps_applied, 2);
        assert_eq!(migrated.state.schema_version, 3);
        assert_eq!(migrated.state.trackers[0].xp, 42);

        let from_two = json!({
            "schemaVersion": 2,
            "trackers": [{ "id": "a", "name": "A", "category": "Skill", "xp": 5, "log": [] }],
            "timeline": []
        });
        let migrated = migrate_with(&from_two, &steps, NOW).expect("object should migrate");
        assert_eq!(migrated.steps_applied, 1);
        assert_eq!(migrated.state.trackers[0].xp, 10);
    }
}
