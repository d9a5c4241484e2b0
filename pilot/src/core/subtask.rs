//! Subtask model shared by the state log, prompt rendering, and transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress state of a single subtask.
///
/// `unknown` never appears in canonical data: it is the merge fallback for
/// steps a snapshot failed to record (see [`crate::core::state_log`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskState {
    Pending,
    Doing,
    Done,
    Unknown,
}

impl SubtaskState {
    /// Progress rank under `pending < doing < done`. `unknown` has no rank.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Doing => Some(1),
            Self::Done => Some(2),
            Self::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Doing => "doing",
            Self::Done => "done",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the lowercase state word used by policy declarations.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "pending" => Some(Self::Pending),
            "doing" => Some(Self::Doing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for SubtaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for the two legal forward edges: `pending -> doing`, `doing -> done`.
pub fn is_forward_transition(from: SubtaskState, to: SubtaskState) -> bool {
    matches!(
        (from, to),
        (SubtaskState::Pending, SubtaskState::Doing) | (SubtaskState::Doing, SubtaskState::Done)
    )
}

/// One canonical subtask record, as written by the generation step.
///
/// Membership and ordering are fixed for the run; only the tracked state
/// (kept separately in the state log) changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub step: u32,
    pub subtask: String,
    pub start_condition: String,
    pub end_condition: String,
}

/// A canonical subtask paired with its live state, produced by merge-at-time
/// and consumed by prompt rendering and the transition engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSubtask {
    pub step: u32,
    pub subtask: String,
    pub start_condition: String,
    pub end_condition: String,
    pub state: SubtaskState,
}

impl TrackedSubtask {
    pub fn from_subtask(subtask: &Subtask, state: SubtaskState) -> Self {
        Self {
            step: subtask.step,
            subtask: subtask.subtask.clone(),
            start_condition: subtask.start_condition.clone(),
            end_condition: subtask.end_condition.clone(),
            state,
        }
    }
}

/// Check semantic invariants of a generated subtask list:
/// - non-empty, steps strictly ascending from 1
/// - first subtask starts unconditionally (`always`)
/// - the word "stop" appears only in the final subtask description
pub fn validate_subtask_list(subtasks: &[Subtask]) -> Vec<String> {
    let mut errors = Vec::new();

    if subtasks.is_empty() {
        errors.push("subtask list must not be empty".to_string());
        return errors;
    }

    for (index, subtask) in subtasks.iter().enumerate() {
        let expected = index as u32 + 1;
        if subtask.step != expected {
            errors.push(format!(
                "step {} at position {} (expected {})",
                subtask.step, index, expected
            ));
        }
        let is_last = index == subtasks.len() - 1;
        if !is_last && subtask.subtask.to_lowercase().contains("stop") {
            errors.push(format!(
                "step {}: only the final subtask may mention stopping",
                subtask.step
            ));
        }
    }

    if subtasks[0].start_condition.trim().to_lowercase() != "always" {
        errors.push(format!(
            "step {}: first start_condition must be 'always' (got '{}')",
            subtasks[0].step, subtasks[0].start_condition
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtask(step: u32, description: &str, start: &str) -> Subtask {
        Subtask {
            step,
            subtask: description.to_string(),
            start_condition: start.to_string(),
            end_condition: format!("{description} complete"),
        }
    }

    #[test]
    fn forward_transitions_are_exactly_two() {
        assert!(is_forward_transition(
            SubtaskState::Pending,
            SubtaskState::Doing
        ));
        assert!(is_forward_transition(
            SubtaskState::Doing,
            SubtaskState::Done
        ));
        assert!(!is_forward_transition(
            SubtaskState::Pending,
            SubtaskState::Done
        ));
        assert!(!is_forward_transition(
            SubtaskState::Doing,
            SubtaskState::Pending
        ));
        assert!(!is_forward_transition(
            SubtaskState::Unknown,
            SubtaskState::Doing
        ));
    }

    #[test]
    fn valid_list_passes() {
        let list = vec![
            subtask(1, "walk along the path", "always"),
            subtask(2, "Stop when the bench is reached", "bench visible"),
        ];
        assert!(validate_subtask_list(&list).is_empty());
    }

    #[test]
    fn rejects_non_ascending_steps() {
        let list = vec![
            subtask(1, "walk", "always"),
            subtask(3, "turn left", "path ends"),
        ];
        let errors = validate_subtask_list(&list);
        assert!(errors.iter().any(|e| e.contains("step 3")));
    }

    #[test]
    fn rejects_stop_outside_final_subtask() {
        let list = vec![
            subtask(1, "stop at the gate", "always"),
            subtask(2, "continue forward", "gate passed"),
        ];
        let errors = validate_subtask_list(&list);
        assert!(errors.iter().any(|e| e.contains("final subtask")));
    }

    #[test]
    fn rejects_conditional_first_start() {
        let list = vec![subtask(1, "walk", "bench visible")];
        let errors = validate_subtask_list(&list);
        assert!(errors.iter().any(|e| e.contains("'always'")));
    }

    #[test]
    fn state_words_round_trip() {
        for state in [
            SubtaskState::Pending,
            SubtaskState::Doing,
            SubtaskState::Done,
        ] {
            assert_eq!(SubtaskState::parse(state.as_str()), Some(state));
        }
        assert_eq!(SubtaskState::parse("paused"), None);
    }
}
