//! Keyword bonus for journal text.
//!
//! The bonus is deterministic and derived; repair clamps any stored value
//! to `[0, MAX_SEMANTIC_XP]` regardless of which scorer produced it.

use crate::model::MAX_SEMANTIC_XP;

/// Computes the bonus XP an entry's text earns.
pub trait SemanticScorer {
    fn score(&self, text: &str) -> i64;
}

struct KeywordGroup {
    words: &'static [&'static str],
    bonus: i64,
}

const KEYWORD_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        words: &["study", "learn", "practice", "read", "research", "course", "training"],
        bonus: 3,
    },
    KeywordGroup {
        words: &["build", "create", "code", "design", "write", "draw", "ship", "deploy"],
        bonus: 5,
    },
    KeywordGroup {
        words: &["exercise", "gym", "run", "lift", "train", "workout", "cardio"],
        bonus: 4,
    },
    KeywordGroup {
        words: &["job", "work", "project", "client", "deadline", "career", "resume", "portfolio"],
        bonus: 5,
    },
    KeywordGroup {
        words: &["help", "volunteer", "teach", "mentor", "coach", "support"],
        bonus: 4,
    },
    KeywordGroup {
        words: &["meditate", "focus", "discipline", "routine", "plan", "organize"],
        bonus: 3,
    },
];

/// Substring keyword matcher. Each group contributes its bonus at most once.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl SemanticScorer for KeywordScorer {
    fn score(&self, text: &str) -> i64 {
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return 0;
        }
        let bonus: i64 = KEYWORD_GROUPS
            .iter()
            .filter(|group| group.words.iter().any(|word| lowered.contains(word)))
            .map(|group| group.bonus)
            .sum();
        bonus.clamp(0, MAX_SEMANTIC_XP)
    }
}
