//! Career progression trees attached to trackers.
//!
//! Only shape is enforced here; preset content lives with the UI layer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_NODE_GROUP: &str = "Custom";
pub const DEFAULT_NODE_TITLE: &str = "Milestone";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerTree {
    #[serde(default)]
    pub career_preset_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<CareerNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerNode {
    pub id: String,
    pub group: String,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    pub xp: i64,
    /// Ids of nodes that must be done before this one unlocks.
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub done: bool,
}

impl CareerTree {
    pub fn node(&self, node_id: &str) -> Option<&CareerNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    /// A node is unlocked when every required node is done.
    ///
    /// Unknown node ids are never unlocked.
    pub fn is_node_unlocked(&self, node_id: &str) -> bool {
        let Some(node) = self.node(node_id) else {
            return false;
        };
        let done: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|candidate| candidate.done)
            .map(|candidate| candidate.id.as_str())
            .collect();
        node.requires
            .iter()
            .all(|required| done.contains(required.as_str()))
    }

    /// Returns `(done, total)` node counts.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.nodes.iter().filter(|node| node.done).count();
        (done, self.nodes.len())
    }
}
