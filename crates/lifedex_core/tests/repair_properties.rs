use lifedex_core::integrity::invariants::check;
use lifedex_core::integrity::migrate::migrate;
use lifedex_core::integrity::repair::{repair_at, repair_state_at, RepairIssue, Repaired};
use lifedex_core::model::{CURRENT_SCHEMA_VERSION, MAX_TIMELINE};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const NOW: i64 = 1_700_000_000_000;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1.0e20f64..1.0e20).prop_map(|value| json!(value)),
        "[ a-zA-Z0-9.:/;,=-]{0,12}".prop_map(Value::from),
    ]
}

fn text() -> impl Strategy<Value = Value> {
    prop_oneof![3 => "[ a-z]{0,6}".prop_map(Value::from), 1 => scalar()]
}

fn raw_attachment() -> impl Strategy<Value = Value> {
    let payload = prop_oneof![
        "data:image/png;base64,[A-Z]{0,8}".prop_map(Value::from),
        "data:[a-z]{0,4}".prop_map(Value::from),
        scalar(),
    ];
    let object = ("[a-z ]{0,130}", text(), scalar(), payload).prop_map(
        |(name, mime, size, payload)| {
            json!({ "name": name, "type": mime, "size": size, "embeddedPayload": payload })
        },
    );
    prop_oneof![4 => object, 1 => scalar()]
}

fn raw_attachments() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => prop::collection::vec(raw_attachment(), 0..6).prop_map(Value::Array),
        1 => scalar(),
    ]
}

fn raw_entry() -> impl Strategy<Value = Value> {
    let fields = (
        text(),
        scalar(),
        scalar(),
        text(),
        scalar(),
        raw_attachments(),
        prop::option::of(prop_oneof![Just(json!("a")), Just(json!("")), scalar()]),
    );
    let object = fields.prop_map(|(text, xp, semantic, kind, timestamp, attachments, tracker)| {
        let mut entry = Map::new();
        entry.insert("text".to_string(), text);
        entry.insert("xp".to_string(), xp);
        entry.insert("semanticXp".to_string(), semantic);
        entry.insert("entryKind".to_string(), kind);
        entry.insert("timestamp".to_string(), timestamp);
        entry.insert("attachments".to_string(), attachments);
        if let Some(tracker) = tracker {
            entry.insert("trackerId".to_string(), tracker);
        }
        Value::Object(entry)
    });
    prop_oneof![5 => object, 1 => scalar()]
}

fn raw_tracker() -> impl Strategy<Value = Value> {
    let id = prop_oneof![
        Just(json!("a")),
        Just(json!("b")),
        Just(json!("")),
        Just(json!(" ")),
        scalar(),
    ];
    let category = prop_oneof![
        Just(json!("Skill")),
        Just(json!("Career")),
        Just(json!("Hobby")),
        Just(json!("skill")),
        scalar(),
    ];
    let log = prop_oneof![
        4 => prop::collection::vec(raw_entry(), 0..4).prop_map(Value::Array),
        1 => scalar(),
    ];
    let object = (id, text(), category, scalar(), log).prop_map(|(id, name, category, xp, log)| {
        json!({ "id": id, "name": name, "category": category, "xp": xp, "log": log })
    });
    prop_oneof![5 => object, 1 => scalar()]
}

fn raw_document() -> impl Strategy<Value = Value> {
    let trackers = prop_oneof![
        4 => prop::collection::vec(raw_tracker(), 0..5).prop_map(Value::Array),
        1 => scalar(),
    ];
    let timeline = prop_oneof![
        4 => prop::collection::vec(raw_entry(), 0..8).prop_map(Value::Array),
        1 => scalar(),
    ];
    let document = (prop::option::of(scalar()), trackers, timeline).prop_map(
        |(version, trackers, timeline)| {
            let mut document = Map::new();
            if let Some(version) = version {
                document.insert("schemaVersion".to_string(), version);
            }
            document.insert("trackers".to_string(), trackers);
            document.insert("timeline".to_string(), timeline);
            Value::Object(document)
        },
    );
    prop_oneof![6 => document, 1 => scalar()]
}

proptest! {
    #[test]
    fn repair_is_idempotent(raw in raw_document()) {
        let first = repair_at(&raw, NOW);
        let reencoded = serde_json::to_value(first.state()).unwrap();
        prop_assert_eq!(repair_at(&reencoded, NOW), Repaired::Valid(first.state().clone()));
        prop_assert_eq!(
            repair_state_at(first.state().clone(), NOW),
            Repaired::Valid(first.state().clone())
        );
    }

    #[test]
    fn repair_output_satisfies_invariants(raw in raw_document()) {
        let repaired = repair_at(&raw, NOW);
        let state = repaired.state();
        prop_assert!(check(state).is_empty(), "violations: {:?}", check(state));
        prop_assert!(state.schema_version > 0);
        for entry in state.trackers.iter().flat_map(|tracker| tracker.log.iter()) {
            prop_assert!((0..=25).contains(&entry.semantic_xp));
            prop_assert!(entry.timestamp > 0);
            prop_assert!(!entry.entry_kind.trim().is_empty());
        }
    }

    #[test]
    fn migrate_rejects_only_non_objects(raw in raw_document()) {
        prop_assert_eq!(migrate(&raw).is_some(), raw.is_object());
    }
}

#[test]
fn colliding_ids_are_made_unique_first_occurrence_wins() {
    let raw = json!({
        "schemaVersion": 3,
        "trackers": [
            { "id": "dup", "name": "First", "category": "Skill", "xp": 1, "log": [] },
            { "id": "dup", "name": "Second", "category": "Hobby", "xp": 2, "log": [] },
            { "id": "other", "name": "Third", "category": "Trait", "xp": 3, "log": [] }
        ],
        "timeline": []
    });

    let repaired = repair_at(&raw, NOW);
    let trackers = &repaired.state().trackers;
    assert_eq!(trackers[0].id.as_str(), "dup");
    assert_ne!(trackers[1].id.as_str(), "dup");
    assert_ne!(trackers[1].id.as_str(), "other");
    let unique: HashSet<&str> = trackers.iter().map(|tracker| tracker.id.as_str()).collect();
    assert_eq!(unique.len(), 3);
    assert!(repaired.issues().contains(&RepairIssue::TrackerIdReplaced {
        index: 1,
        previous: "dup".to_string()
    }));
}

#[test]
fn timeline_is_capped_to_the_most_recent_entries() {
    let timeline: Vec<Value> = (0..400)
        .map(|index| json!({ "text": format!("entry {index}"), "xp": 1, "timestamp": NOW - index }))
        .collect();
    let raw = json!({ "schemaVersion": 3, "trackers": [], "timeline": timeline });

    let repaired = repair_at(&raw, NOW);
    let timeline = &repaired.state().timeline;
    assert_eq!(timeline.len(), MAX_TIMELINE);
    assert_eq!(timeline[0].entry.text, "entry 0");
    assert_eq!(timeline[MAX_TIMELINE - 1].entry.text, "entry 299");
    assert!(repaired
        .issues()
        .contains(&RepairIssue::TimelineTruncated { dropped: 100 }));
}

#[test]
fn unversioned_documents_migrate_to_the_current_version() {
    let raw = json!({
        "dexes": [
            { "id": "x", "name": "Legacy", "type": "Career", "xp": "12", "log": [
                { "text": "old entry", "xp": 12, "entryType": "journal", "ts": 5 },
                { "text": "", "xp": 0 }
            ] }
        ],
        "timeline": [
            { "dexId": "x", "dex": "Legacy", "dexType": "Career", "text": "old entry", "xp": 12 }
        ]
    });

    let migrated = migrate(&raw).expect("object documents migrate");
    assert_eq!(migrated.read_version, None);
    assert_eq!(migrated.state.schema_version, CURRENT_SCHEMA_VERSION);
    assert!(check(&migrated.state).is_empty());

    let tracker = &migrated.state.trackers[0];
    assert_eq!(tracker.xp, 12);
    assert_eq!(tracker.log.len(), 1);
    assert_eq!(tracker.log[0].entry_kind, "journal");
    assert_eq!(tracker.log[0].timestamp, 5);
    assert_eq!(
        migrated.state.timeline[0].tracker(&migrated.state).map(|t| t.name.as_str()),
        Some("Legacy")
    );
}

#[test]
fn saturated_xp_survives_repair_and_totals_without_overflow() {
    let raw = json!({
        "schemaVersion": 3,
        "trackers": [
            { "id": "a", "name": "Huge", "category": "Skill", "xp": 1e20, "log": [] },
            { "id": "b", "name": "Small", "category": "Hobby", "xp": 5, "log": [] }
        ],
        "timeline": []
    });

    let repaired = repair_at(&raw, NOW);
    let state = repaired.state();
    assert_eq!(state.trackers[0].xp, i64::MAX);
    assert_eq!(state.total_xp(), i64::MAX);
}
