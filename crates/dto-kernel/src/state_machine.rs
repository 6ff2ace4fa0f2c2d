//! Task lifecycle state machine.
//!
//! Enumerates the legal [`TaskStatus`] transitions and validates proposed
//! `(from, to)` pairs. The machine itself is stateless — it carries no task
//! data, it only answers "is this transition legal".
//!
//! ```text
//! PENDING  → QUEUED           (initial enqueue)
//! PENDING  → CANCELED
//! QUEUED   → RUNNING          (worker claim)
//! QUEUED   → CANCELED
//! RUNNING  → COMPLETED        (handler success)
//! RUNNING  → FAILED           (handler error, attempts exhausted)
//! RUNNING  → QUEUED           (handler error, retry scheduled)
//! RUNNING  → CANCELED
//! ```
//!
//! Any other transition is rejected. `COMPLETED`, `FAILED`, and `CANCELED`
//! are terminal and have no outgoing edges.

use std::collections::HashSet;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl TaskStatus {
    /// Whether this status has no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    /// Parse a status from its wire/API string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "QUEUED" => Some(TaskStatus::Queued),
            "RUNNING" => Some(TaskStatus::Running),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            "CANCELED" => Some(TaskStatus::Canceled),
            _ => None,
        }
    }

    /// Render as the wire/API string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static ALLOWED: LazyLock<HashSet<(TaskStatus, TaskStatus)>> = LazyLock::new(|| {
    use TaskStatus::{Canceled, Completed, Failed, Pending, Queued, Running};
    HashSet::from([
        (Pending, Queued),
        (Pending, Canceled),
        (Queued, Running),
        (Queued, Canceled),
        (Running, Completed),
        (Running, Failed),
        (Running, Queued),
        (Running, Canceled),
    ])
});

/// Return whether the `from -> to` transition is in the allowed-transition set.
#[must_use]
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    ALLOWED.contains(&(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn legal_transitions_are_allowed() {
        assert!(can_transition(Pending, Queued));
        assert!(can_transition(Pending, Canceled));
        assert!(can_transition(Queued, Running));
        assert!(can_transition(Queued, Canceled));
        assert!(can_transition(Running, Completed));
        assert!(can_transition(Running, Failed));
        assert!(can_transition(Running, Queued));
        assert!(can_transition(Running, Canceled));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [Completed, Failed, Canceled] {
            for to in [Pending, Queued, Running, Completed, Failed, Canceled] {
                assert!(
                    !can_transition(terminal, to),
                    "{terminal:?} -> {to:?} should be illegal"
                );
            }
        }
    }

    #[test]
    fn unrelated_pairs_are_rejected() {
        assert!(!can_transition(Pending, Running));
        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Queued, Completed));
        assert!(!can_transition(Queued, Failed));
        assert!(!can_transition(Queued, Pending));
    }

    #[test]
    fn is_terminal_matches_allowed_set() {
        assert!(!Pending.is_terminal());
        assert!(!Queued.is_terminal());
        assert!(!Running.is_terminal());
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Canceled.is_terminal());
    }

    #[test]
    fn parse_and_display_round_trip() {
        for s in [Pending, Queued, Running, Completed, Failed, Canceled] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
            assert_eq!(s.to_string(), s.as_str());
        }
        assert_eq!(TaskStatus::parse("NOT_A_STATUS"), None);
    }
}
