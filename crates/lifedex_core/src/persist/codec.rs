//! Envelope encoding and tolerant loading.

use crate::integrity::migrate::migrate;
use crate::model::state::State;
use crate::store::KeyValueStore;
use log::{debug, warn};
use serde_json::Value;

pub fn encode(state: &State) -> serde_json::Result<String> {
    serde_json::to_string(state)
}

/// Human-readable form used for exported documents.
pub fn encode_pretty(state: &State) -> serde_json::Result<String> {
    serde_json::to_string_pretty(state)
}

/// Parses and migrates stored text. Unparsable or non-object text is `None`.
pub fn decode(text: &str) -> Option<State> {
    let value: Value = serde_json::from_str(text).ok()?;
    migrate(&value).map(|migrated| migrated.state)
}

/// Loads the document under `key`.
///
/// Missing, unreadable or malformed data reads as "no saved state".
pub fn load_state<S: KeyValueStore>(store: &S, key: &str) -> Option<State> {
    let text = match store.get(key) {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("event=state_load module=persist status=empty");
            return None;
        }
        Err(err) => {
            warn!("event=state_load module=persist status=error error={err}");
            return None;
        }
    };

    let state = decode(text.as_str());
    if state.is_none() {
        warn!(
            "event=state_load module=persist status=error error_code=malformed bytes={}",
            text.len()
        );
    }
    state
}

/// Copy of `state` with every embedded attachment payload removed.
///
/// Attachment metadata (name, type, size) is retained.
pub fn strip_embedded_payloads(state: &State) -> State {
    let mut stripped = state.clone();
    let log_attachments = stripped
        .trackers
        .iter_mut()
        .flat_map(|tracker| tracker.log.iter_mut())
        .flat_map(|entry| entry.attachments.iter_mut());
    let timeline_attachments = stripped
        .timeline
        .iter_mut()
        .flat_map(|item| item.entry.attachments.iter_mut());
    for attachment in log_attachments.chain(timeline_attachments) {
        attachment.embedded_payload = None;
    }
    stripped
}
