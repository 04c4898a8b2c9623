//! Tracker-level actions built on the commit pipeline.
//!
//! # Invariants
//! - Every action validates its target against the live state first and
//!   returns an error without committing when the target is missing.
//! - XP awards never push a tracker below zero; the recorded entry carries
//!   the delta actually applied.

use crate::integrity::repair::read_career_tree;
use crate::model::career::CareerTree;
use crate::model::entry::{
    Attachment, LogEntry, TimelineEntry, DEFAULT_ENTRY_KIND, DEFAULT_VERIFICATION_STATUS,
};
use crate::model::state::{Category, Tracker, TrackerId};
use crate::model::MAX_SEMANTIC_XP;
use crate::service::session::ProgressSession;
use crate::service::{ImportError, ServiceError, ServiceResult};
use crate::store::KeyValueStore;
use log::info;
use serde_json::Value;

pub const MILESTONE_ENTRY_KIND: &str = "milestone";

/// Request model for awarding XP to a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddXpRequest {
    /// Base XP; may be negative.
    pub amount: i64,
    /// Journal text. Blank text awards XP without recording an entry.
    pub text: String,
    pub entry_kind: String,
    /// Attachment records from the attachment collaborator.
    pub attachments: Vec<Attachment>,
    pub verification_status: String,
}

impl AddXpRequest {
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            text: String::new(),
            entry_kind: DEFAULT_ENTRY_KIND.to_string(),
            attachments: Vec::new(),
            verification_status: DEFAULT_VERIFICATION_STATUS.to_string(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.entry_kind = kind.into();
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_verification_status(mut self, status: impl Into<String>) -> Self {
        self.verification_status = status.into();
        self
    }
}

impl<S: KeyValueStore> ProgressSession<S> {
    /// Adds an empty tracker and returns its generated id.
    pub fn create_tracker(&mut self, name: &str, category: Category) -> ServiceResult<TrackerId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidName);
        }
        let tracker = Tracker::new(name, category);
        let id = tracker.id.clone();
        self.commit(move |draft| draft.trackers.push(tracker));
        info!(
            "event=tracker_create module=session status=ok category={}",
            category.as_str()
        );
        Ok(id)
    }

    /// Renames and recategorizes a tracker. XP, log and career tree are kept.
    pub fn edit_tracker(
        &mut self,
        id: &TrackerId,
        name: &str,
        category: Category,
    ) -> ServiceResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidName);
        }
        self.ensure_tracker(id)?;
        self.commit(|draft| {
            if let Some(tracker) = draft.tracker_mut(id) {
                tracker.name = name.to_string();
                tracker.category = category;
            }
        });
        Ok(())
    }

    /// Awards XP, plus the text's keyword bonus when text is present.
    ///
    /// Returns the delta actually applied after clamping at zero. Non-blank
    /// text is recorded in the tracker log and at the head of the timeline.
    pub fn add_xp(&mut self, id: &TrackerId, request: AddXpRequest) -> ServiceResult<i64> {
        self.ensure_tracker(id)?;

        let text = request.text.trim().to_string();
        let semantic_xp = if text.is_empty() {
            0
        } else {
            self.scorer().score(text.as_str()).clamp(0, MAX_SEMANTIC_XP)
        };
        let timestamp = self.epoch_ms();

        let delta = self.commit(|draft| {
            let Some(tracker) = draft.tracker_mut(id) else {
                return 0;
            };
            let before = tracker.xp;
            let after = before
                .saturating_add(request.amount)
                .saturating_add(semantic_xp)
                .max(0);
            tracker.xp = after;
            let delta = after - before;

            if !text.is_empty() {
                let entry = LogEntry {
                    text,
                    xp: delta,
                    semantic_xp,
                    entry_kind: request.entry_kind,
                    attachments: request.attachments,
                    verification_status: request.verification_status,
                    timestamp,
                };
                tracker.log.push(entry.clone());
                let projected = TimelineEntry::project(tracker, &entry);
                draft.timeline.insert(0, projected);
            }
            delta
        });

        info!(
            "event=xp_award module=session status=ok delta={} semantic={}",
            delta, semantic_xp
        );
        Ok(delta)
    }

    /// Attaches (or replaces) a tracker's career tree, e.g. from a preset.
    pub fn set_career_tree(&mut self, id: &TrackerId, tree: CareerTree) -> ServiceResult<()> {
        self.ensure_tracker(id)?;
        self.commit(move |draft| {
            if let Some(tracker) = draft.tracker_mut(id) {
                tracker.career_tree = Some(tree);
            }
        });
        Ok(())
    }

    /// Attaches a career tree read from a JSON document shaped like a
    /// tracker's exported `careerTree` object.
    ///
    /// # Errors
    /// - `TrackerNotFound` before the text is looked at.
    /// - `Import` when the text is not JSON or not an object.
    pub fn set_career_tree_from_json(&mut self, id: &TrackerId, text: &str) -> ServiceResult<()> {
        self.ensure_tracker(id)?;
        let value: Value = serde_json::from_str(text).map_err(ImportError::from)?;
        let tree = read_career_tree(&value).ok_or(ImportError::NotAnObject)?;
        self.set_career_tree(id, tree)
    }

    /// Marks an unlocked career node done and awards its XP.
    ///
    /// Returns the XP awarded; completing an already-done node is a no-op
    /// returning zero.
    pub fn complete_career_node(&mut self, id: &TrackerId, node_id: &str) -> ServiceResult<i64> {
        let tracker = self
            .state()
            .tracker(id)
            .ok_or_else(|| ServiceError::TrackerNotFound(id.clone()))?;
        let not_found = || ServiceError::CareerNodeNotFound {
            tracker: id.clone(),
            node: node_id.to_string(),
        };
        let tree = tracker.career_tree.as_ref().ok_or_else(not_found)?;
        let node = tree.node(node_id).ok_or_else(not_found)?;
        if node.done {
            return Ok(0);
        }
        if !tree.is_node_unlocked(node_id) {
            return Err(ServiceError::CareerNodeLocked {
                tracker: id.clone(),
                node: node_id.to_string(),
            });
        }

        let reward = node.xp.max(0);
        let text = format!("Milestone: {}", node.title);
        let timestamp = self.epoch_ms();

        self.commit(|draft| {
            let Some(tracker) = draft.tracker_mut(id) else {
                return;
            };
            if let Some(node) = tracker
                .career_tree
                .as_mut()
                .and_then(|tree| tree.nodes.iter_mut().find(|node| node.id == node_id))
            {
                node.done = true;
            }
            tracker.xp = tracker.xp.saturating_add(reward);
            let entry = LogEntry::new(text, reward, timestamp).with_kind(MILESTONE_ENTRY_KIND);
            let projected = TimelineEntry::project(tracker, &entry);
            draft.timeline.insert(0, projected);
        });

        info!("event=career_node_complete module=session status=ok reward={reward}");
        Ok(reward)
    }

    fn ensure_tracker(&self, id: &TrackerId) -> ServiceResult<()> {
        if self.state().tracker(id).is_some() {
            Ok(())
        } else {
            Err(ServiceError::TrackerNotFound(id.clone()))
        }
    }
}
