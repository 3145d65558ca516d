//! Visibility policy: from vote counters to what the local user sees.
//!
//! - `local == Add` -> shown, whatever the score
//! - `local == Remove` -> hidden, whatever the score
//! - no local vote: `score >= show` shown, `hide < score < show` suggested,
//!   otherwise hidden
//!
//! Thresholds are policy knobs; the merge never looks at them.

use crate::models::{OperationKind, Statement};

/// Minimum score for a statement to be shown without a local vote.
pub const SHOW_THRESHOLD: i64 = 1;

/// Scores at or below this are hidden rather than suggested.
pub const HIDE_THRESHOLD: i64 = -2;

/// How a statement is presented locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Shown,
    Suggested,
    Hidden,
}

/// Classifies statements by score and local override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPolicy {
    pub show_threshold: i64,
    pub hide_threshold: i64,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            show_threshold: SHOW_THRESHOLD,
            hide_threshold: HIDE_THRESHOLD,
        }
    }
}

impl VisibilityPolicy {
    /// Create a policy with custom thresholds.
    pub const fn new(show_threshold: i64, hide_threshold: i64) -> Self {
        Self {
            show_threshold,
            hide_threshold,
        }
    }

    /// Shown: the local user added it, or nobody local voted and the score
    /// reaches the show threshold.
    pub const fn is_shown(&self, local: Option<OperationKind>, score: i64) -> bool {
        match local {
            Some(OperationKind::Add) => true,
            Some(OperationKind::Remove) => false,
            None => score >= self.show_threshold,
        }
    }

    /// Suggested: no local vote and the score is strictly between the thresholds.
    pub const fn is_suggested(&self, local: Option<OperationKind>, score: i64) -> bool {
        local.is_none() && self.hide_threshold < score && score < self.show_threshold
    }

    /// Classify a statement.
    pub fn classify(&self, statement: &Statement) -> Visibility {
        let score = statement.score();
        if self.is_shown(statement.local_operation, score) {
            Visibility::Shown
        } else if self.is_suggested(statement.local_operation, score) {
            Visibility::Suggested
        } else {
            Visibility::Hidden
        }
    }

    /// Bootstrap vote weight: enough for one synthetic vote to be shown.
    pub fn seed_weight(&self) -> u32 {
        self.show_threshold.clamp(0, i64::from(u32::MAX)) as u32
    }
}
