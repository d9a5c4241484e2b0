//! Append-only, time-ordered subtask-state snapshots with merge-at-time queries.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::subtask::{Subtask, SubtaskState, TrackedSubtask};
use crate::core::time::TimeKey;

/// State of one subtask as recorded by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub step: u32,
    pub state: SubtaskState,
}

/// Immutable recording of every subtask's state at one clock key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub time: TimeKey,
    pub subtask_list: Vec<StateEntry>,
}

impl StateSnapshot {
    /// The run-start snapshot: every canonical subtask `pending` at `0'0`.
    pub fn initial(subtasks: &[Subtask]) -> Self {
        Self {
            time: TimeKey::zero(),
            subtask_list: subtasks
                .iter()
                .map(|subtask| StateEntry {
                    step: subtask.step,
                    state: SubtaskState::Pending,
                })
                .collect(),
        }
    }
}

/// `query_at` found no snapshot at or before the requested time. The caller
/// failed to seed the initial snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSnapshotAtTime {
    pub time: TimeKey,
}

impl fmt::Display for NoSnapshotAtTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no snapshot at or before {}", self.time)
    }
}

impl StdError for NoSnapshotAtTime {}

/// An appended snapshot did not strictly advance the clock. Snapshots are
/// produced only by the loop driver, so this is a programming error, not a
/// recoverable input condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOutOfOrder {
    pub last: TimeKey,
    pub offered: TimeKey,
}

impl fmt::Display for SnapshotOutOfOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "snapshot time {} does not advance past {}",
            self.offered, self.last
        )
    }
}

impl StdError for SnapshotOutOfOrder {}

/// Merged view of the canonical subtask list and a snapshot's live states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeView {
    pub subtasks: Vec<TrackedSubtask>,
    /// Steps the canonical list names but the snapshot omitted. Their state
    /// is reported as `unknown` rather than failing the query; callers must
    /// surface a warning when this is non-empty.
    pub missing_steps: Vec<u32>,
}

/// Strictly time-ascending sequence of snapshots for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateLog {
    snapshots: Vec<StateSnapshot>,
}

impl StateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from already-ordered snapshots, validating ascension.
    pub fn from_snapshots(snapshots: Vec<StateSnapshot>) -> Result<Self, SnapshotOutOfOrder> {
        let mut log = Self::new();
        for snapshot in snapshots {
            log.append(snapshot)?;
        }
        Ok(log)
    }

    pub fn snapshots(&self) -> &[StateSnapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&StateSnapshot> {
        self.snapshots.last()
    }

    /// Append a snapshot whose time strictly exceeds every prior one.
    pub fn append(&mut self, snapshot: StateSnapshot) -> Result<(), SnapshotOutOfOrder> {
        if let Some(last) = self.snapshots.last()
            && snapshot.time <= last.time
        {
            return Err(SnapshotOutOfOrder {
                last: last.time,
                offered: snapshot.time,
            });
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// The snapshot with the greatest time `<= t`.
    pub fn query_at(&self, t: TimeKey) -> Result<&StateSnapshot, NoSnapshotAtTime> {
        self.snapshots
            .iter()
            .rev()
            .find(|snapshot| snapshot.time <= t)
            .ok_or(NoSnapshotAtTime { time: t })
    }

    /// Pair canonical descriptions with the live states as of `t`.
    ///
    /// A step missing from the snapshot falls back to `unknown` instead of
    /// failing: one malformed historical entry must not halt the run.
    pub fn merge(&self, canonical: &[Subtask], t: TimeKey) -> Result<MergeView, NoSnapshotAtTime> {
        let snapshot = self.query_at(t)?;
        let mut missing_steps = Vec::new();
        let subtasks = canonical
            .iter()
            .map(|subtask| {
                let state = snapshot
                    .subtask_list
                    .iter()
                    .find(|entry| entry.step == subtask.step)
                    .map(|entry| entry.state);
                let state = state.unwrap_or_else(|| {
                    missing_steps.push(subtask.step);
                    SubtaskState::Unknown
                });
                TrackedSubtask::from_subtask(subtask, state)
            })
            .collect();
        Ok(MergeView {
            subtasks,
            missing_steps,
        })
    }
}
