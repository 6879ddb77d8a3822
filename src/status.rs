//! Task lifecycle status.
//!
//! Statuses progress `preprocessing < submitted < delegating < processing <
//! processed < completed`. `error` ranks above everything. The server may
//! also report statuses this client does not know about; those are kept
//! verbatim in [`TaskStatus::Other`] and have no rank.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Preprocessing,
    Submitted,
    Delegating,
    Processing,
    Processed,
    Completed,
    Error,
    /// A status string outside the known lifecycle.
    Other(String),
}

impl TaskStatus {
    /// Wire name of the status, as the server reports it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Preprocessing => "preprocessing",
            Self::Submitted => "submitted",
            Self::Delegating => "delegating",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }

    /// Position in the lifecycle, `None` for unrecognized statuses.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Preprocessing => Some(0),
            Self::Submitted => Some(1),
            Self::Delegating => Some(2),
            Self::Processing => Some(3),
            Self::Processed => Some(4),
            Self::Completed => Some(5),
            Self::Error => Some(6),
            Self::Other(_) => None,
        }
    }

    /// `error` and `completed` end a task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Completed)
    }

    /// Whether this status has reached at least `target`.
    ///
    /// `error` satisfies every target and `completed` satisfies every target
    /// except `error`, including targets this client does not recognize.
    ///
    /// # Panics
    ///
    /// Panics when either side is an unrecognized status and neither
    /// short-circuit above applies. Such a comparison is a caller bug.
    pub fn greater_than_or_equal(&self, target: &TaskStatus) -> bool {
        match self {
            Self::Error => return true,
            Self::Completed => return *target != Self::Error,
            _ => {}
        }
        match self.partial_cmp(target) {
            Some(ordering) => ordering != Ordering::Less,
            None => {
                let unknown = if self.rank().is_none() { self } else { target };
                panic!("can't compare status of type: {}", unknown)
            }
        }
    }
}

impl PartialOrd for TaskStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank()?.cmp(&other.rank()?))
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "preprocessing" => Self::Preprocessing,
            "submitted" => Self::Submitted,
            "delegating" => Self::Delegating,
            "processing" => Self::Processing,
            "processed" => Self::Processed,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIFECYCLE: [TaskStatus; 6] = [
        TaskStatus::Preprocessing,
        TaskStatus::Submitted,
        TaskStatus::Delegating,
        TaskStatus::Processing,
        TaskStatus::Processed,
        TaskStatus::Completed,
    ];

    #[test]
    fn test_lifecycle_is_totally_ordered() {
        for (i, a) in LIFECYCLE.iter().enumerate() {
            for (j, b) in LIFECYCLE.iter().enumerate() {
                assert_eq!(a.greater_than_or_equal(b), i >= j, "{a} >= {b}");
            }
        }
    }

    #[test]
    fn test_error_dominates() {
        for status in LIFECYCLE.iter() {
            assert!(TaskStatus::Error.greater_than_or_equal(status));
            assert!(!status.greater_than_or_equal(&TaskStatus::Error));
        }
        assert!(TaskStatus::Error.greater_than_or_equal(&TaskStatus::Error));
        assert!(TaskStatus::Error.greater_than_or_equal(&TaskStatus::from("tasking")));
    }

    #[test]
    fn test_completed_dominates_non_error() {
        assert!(TaskStatus::Completed.greater_than_or_equal(&TaskStatus::Processed));
        assert!(TaskStatus::Completed.greater_than_or_equal(&TaskStatus::from("opsec blocked")));
        assert!(!TaskStatus::Completed.greater_than_or_equal(&TaskStatus::Error));
    }

    #[test]
    #[should_panic(expected = "can't compare status of type: cleared")]
    fn test_unknown_comparison_panics() {
        TaskStatus::from("cleared").greater_than_or_equal(&TaskStatus::from("tasking"));
    }

    #[test]
    #[should_panic(expected = "can't compare status of type: bogus")]
    fn test_unknown_target_panics() {
        TaskStatus::Processing.greater_than_or_equal(&TaskStatus::from("bogus"));
    }

    #[test]
    fn test_wire_format() {
        let parsed: TaskStatus = serde_json::from_str("\"processed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Processed);

        let custom: TaskStatus = serde_json::from_str("\"error: timeout\"").unwrap();
        assert_eq!(custom, TaskStatus::Other("error: timeout".to_string()));
        assert!(!custom.is_terminal());
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"error: timeout\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Completed).unwrap(), "\"completed\"");
    }

    #[test]
    fn test_partial_ord() {
        assert!(TaskStatus::Submitted < TaskStatus::Processing);
        assert!(TaskStatus::Error > TaskStatus::Completed);
        assert_eq!(
            TaskStatus::Processing.partial_cmp(&TaskStatus::from("weird")),
            None
        );
    }
}
