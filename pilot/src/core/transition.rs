//! Guarded application of policy-declared subtask transitions.
//!
//! The declaration is never trusted against the authoritative log: a change
//! applies only when its stated old state matches the live state and its
//! edge is a legal forward transition. Every rejecting outcome leaves the
//! list bit-identical, so a malformed or adversarial reply can fail to
//! advance state but never corrupt it.

use crate::core::parser::StateDeclaration;
use crate::core::subtask::{SubtaskState, TrackedSubtask, is_forward_transition};

/// Result of applying one declaration, reported for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Declared change matched the live state and was applied.
    Applied {
        step: u32,
        from: SubtaskState,
        to: SubtaskState,
    },
    /// Policy declared no change.
    KeptAll,
    /// Declared old state does not match the live state.
    RejectedMismatch {
        step: u32,
        declared: SubtaskState,
        actual: SubtaskState,
    },
    /// Declared edge regresses or skips `doing`.
    RejectedEdge {
        step: u32,
        from: SubtaskState,
        to: SubtaskState,
    },
    /// Declaration referenced a step the list does not contain.
    UnknownStep { step: u32 },
    /// No declaration could be parsed from the reply.
    Unparseable,
}

impl TransitionOutcome {
    /// True when the subtask list was left untouched.
    pub fn left_unchanged(self) -> bool {
        !matches!(self, Self::Applied { .. })
    }
}

/// Validate `declaration` against the live list and apply it if sound.
pub fn apply_declaration(
    subtasks: &mut [TrackedSubtask],
    declaration: Option<StateDeclaration>,
) -> TransitionOutcome {
    let Some(declaration) = declaration else {
        return TransitionOutcome::Unparseable;
    };

    let StateDeclaration::Change { step, from, to } = declaration else {
        return TransitionOutcome::KeptAll;
    };

    if !is_forward_transition(from, to) {
        return TransitionOutcome::RejectedEdge { step, from, to };
    }

    let Some(subtask) = subtasks.iter_mut().find(|subtask| subtask.step == step) else {
        return TransitionOutcome::UnknownStep { step };
    };

    if subtask.state != from {
        return TransitionOutcome::RejectedMismatch {
            step,
            declared: from,
            actual: subtask.state,
        };
    }

    subtask.state = to;
    TransitionOutcome::Applied { step, from, to }
}
