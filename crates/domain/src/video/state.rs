//! Media encoding state machine.

use serde::{Deserialize, Serialize};

/// The encoding status of a time-based media slot.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──┬──► Completed ──┐
///    ▲                     └──► Error ──────┤
///    └──────────── new upload ──────────────┘
/// ```
///
/// Re-reporting the status a slot is already in (`Processing`,
/// `Completed` or `Error`) is accepted as an idempotent replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    /// Uploaded, waiting for the encoder to pick it up.
    #[default]
    Pending,

    /// The encoder accepted the job.
    Processing,

    /// Encoding finished and the encoded path is known (terminal state).
    Completed,

    /// Encoding failed (terminal state).
    Error,
}

impl MediaStatus {
    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: MediaStatus) -> bool {
        match (self, next) {
            (MediaStatus::Pending, MediaStatus::Processing)
            | (MediaStatus::Processing, MediaStatus::Completed)
            | (MediaStatus::Processing, MediaStatus::Error)
            | (MediaStatus::Completed, MediaStatus::Pending)
            | (MediaStatus::Error, MediaStatus::Pending) => true,
            (current, next) => *current == next && next != MediaStatus::Pending,
        }
    }

    /// Returns true if a new file may replace the current one.
    pub fn can_reupload(&self) -> bool {
        self.can_transition_to(MediaStatus::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Completed | MediaStatus::Error)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MediaStatus; 4] = [
        MediaStatus::Pending,
        MediaStatus::Processing,
        MediaStatus::Completed,
        MediaStatus::Error,
    ];

    #[test]
    fn test_default_state_is_pending() {
        assert_eq!(MediaStatus::default(), MediaStatus::Pending);
    }

    #[test]
    fn test_forward_transitions() {
        assert!(MediaStatus::Pending.can_transition_to(MediaStatus::Processing));
        assert!(MediaStatus::Processing.can_transition_to(MediaStatus::Completed));
        assert!(MediaStatus::Processing.can_transition_to(MediaStatus::Error));
    }

    #[test]
    fn test_terminal_states_reopen_only_by_upload() {
        for terminal in [MediaStatus::Completed, MediaStatus::Error] {
            assert!(terminal.can_reupload());
            assert!(!terminal.can_transition_to(MediaStatus::Processing));
        }
        assert!(!MediaStatus::Completed.can_transition_to(MediaStatus::Error));
        assert!(!MediaStatus::Error.can_transition_to(MediaStatus::Completed));
    }

    #[test]
    fn test_cannot_skip_processing() {
        assert!(!MediaStatus::Pending.can_transition_to(MediaStatus::Completed));
        assert!(!MediaStatus::Pending.can_transition_to(MediaStatus::Error));
    }

    #[test]
    fn test_in_flight_media_cannot_be_replaced() {
        assert!(!MediaStatus::Pending.can_reupload());
        assert!(!MediaStatus::Processing.can_reupload());
    }

    #[test]
    fn test_replays_of_reported_status_are_accepted() {
        assert!(MediaStatus::Processing.can_transition_to(MediaStatus::Processing));
        assert!(MediaStatus::Completed.can_transition_to(MediaStatus::Completed));
        assert!(MediaStatus::Error.can_transition_to(MediaStatus::Error));
    }

    #[test]
    fn test_exact_transition_table() {
        let allowed = [
            (MediaStatus::Pending, MediaStatus::Processing),
            (MediaStatus::Processing, MediaStatus::Processing),
            (MediaStatus::Processing, MediaStatus::Completed),
            (MediaStatus::Processing, MediaStatus::Error),
            (MediaStatus::Completed, MediaStatus::Pending),
            (MediaStatus::Completed, MediaStatus::Completed),
            (MediaStatus::Error, MediaStatus::Pending),
            (MediaStatus::Error, MediaStatus::Error),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!MediaStatus::Pending.is_terminal());
        assert!(!MediaStatus::Processing.is_terminal());
        assert!(MediaStatus::Completed.is_terminal());
        assert!(MediaStatus::Error.is_terminal());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&MediaStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let deserialized: MediaStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, MediaStatus::Processing);
    }
}
