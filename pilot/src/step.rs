//! Orchestration for a single decision tick.
//!
//! A tick either fully completes (the advanced snapshot and the decision
//! record are both appended) or it fails before persisting anything, so
//! the logs never hold a partial step.

use std::error::Error as StdError;
use std::fmt;

use anyhow::{Context, Result, anyhow};
use tracing::{error, info, instrument, warn};

use crate::core::parser::{Action, extract_reply, parse_declaration};
use crate::core::state_log::{StateEntry, StateSnapshot};
use crate::core::time::TimeKey;
use crate::core::transition::{TransitionOutcome, apply_declaration};
use crate::io::config::PilotConfig;
use crate::io::depth::DepthSource;
use crate::io::layout::{DatasetPaths, RunPaths};
use crate::io::policy::{PolicyClient, PolicyRequest};
use crate::io::state_store::{DecisionRecord, DurableStateLog, append_decision};
use crate::io::subtask_store::load_subtask_list;
use crate::observe::build_observation;
use crate::prompt::{PromptComposer, PromptInputs};

/// Every allowed policy attempt failed for one tick. Nothing was persisted,
/// so state from before the tick remains valid and queryable.
#[derive(Debug)]
pub struct PolicyUnavailable {
    pub time: TimeKey,
    pub attempts: u32,
    pub last_error: String,
}

impl fmt::Display for PolicyUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "policy unavailable at {} after {} attempts: {}",
            self.time, self.attempts, self.last_error
        )
    }
}

impl StdError for PolicyUnavailable {}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Clock key the tick observed.
    pub time: TimeKey,
    /// Clock key of the appended snapshot (observed time + one interval).
    pub next_time: TimeKey,
    /// Recognized action, when the reply carried a valid token.
    pub action: Option<Action>,
    /// How the declared state transition was handled.
    pub transition: TransitionOutcome,
}

/// Execute one tick of the decision loop at `t`.
#[instrument(skip_all, fields(time = %t))]
pub fn run_tick<P: PolicyClient, D: DepthSource>(
    dataset: &DatasetPaths,
    run: &RunPaths,
    cfg: &PilotConfig,
    policy: &P,
    depth: &D,
    t: TimeKey,
) -> Result<TickOutcome> {
    let shape = cfg
        .grid_shape()
        .ok_or_else(|| anyhow!("grid_cols {} is off-catalogue", cfg.grid_cols))?;

    let canonical = load_subtask_list(&run.subtasks_path)?;
    let mut state = DurableStateLog::open(&run.state_log_path)?;

    let merged = state.log().merge(&canonical, t)?;
    if !merged.missing_steps.is_empty() {
        warn!(
            steps = ?merged.missing_steps,
            "snapshot omitted steps, reporting them as unknown"
        );
    }

    let observation = build_observation(cfg.mode, shape, t, dataset.frame_path(t), depth)?;
    let composer = PromptComposer::new();
    let prompt = composer.compose(&PromptInputs {
        mode: cfg.mode,
        shape,
        buffer_dims: observation.buffer_dims,
        subtasks: &merged.subtasks,
        depth_grid: observation.depth_grid.as_deref(),
    })?;

    let request = PolicyRequest {
        system: prompt.system,
        user: prompt.user,
        images: observation.image_refs(),
    };
    let reply = call_with_retry(policy, &request, cfg.policy.retry_limit, t)?;

    let parsed = extract_reply(&reply);
    if parsed.action.is_none() {
        warn!("reply carried no action tag");
    }
    let declaration = parsed.state.as_deref().and_then(parse_declaration);

    let mut next = merged.subtasks.clone();
    let transition = apply_declaration(&mut next, declaration);
    match transition {
        TransitionOutcome::Applied { step, from, to } => {
            info!(step, %from, %to, "subtask transition applied");
        }
        TransitionOutcome::KeptAll => {}
        TransitionOutcome::RejectedMismatch {
            step,
            declared,
            actual,
        } => {
            warn!(
                step,
                %declared,
                %actual,
                "declared old state does not match, transition rejected"
            );
        }
        TransitionOutcome::RejectedEdge { step, from, to } => {
            warn!(step, %from, %to, "declared edge is not a forward transition, rejected");
        }
        TransitionOutcome::UnknownStep { step } => {
            error!(step, "declaration references an unknown step");
        }
        TransitionOutcome::Unparseable => {
            warn!("no state declaration could be parsed");
        }
    }

    let next_time = t.advanced(cfg.tick_decisteps);
    let snapshot = StateSnapshot {
        time: next_time,
        subtask_list: next
            .iter()
            .map(|subtask| StateEntry {
                step: subtask.step,
                state: subtask.state,
            })
            .collect(),
    };
    state
        .append(snapshot)
        .with_context(|| format!("append snapshot for {next_time}"))?;

    append_decision(
        &run.decisions_path,
        &DecisionRecord {
            time: t,
            action: parsed.action.clone(),
            thought: parsed.thought,
            state_text: parsed.state,
        },
    )?;

    let action = parsed.action.as_deref().and_then(Action::parse);
    info!(action = ?action, "tick complete");
    Ok(TickOutcome {
        time: t,
        next_time,
        action,
        transition,
    })
}

/// Call the policy with bounded retry, reusing the identical pre-call state.
fn call_with_retry<P: PolicyClient>(
    policy: &P,
    request: &PolicyRequest,
    retry_limit: u32,
    t: TimeKey,
) -> Result<String> {
    let mut last_error = String::new();
    for attempt in 1..=retry_limit {
        match policy.decide(request) {
            Ok(reply) => return Ok(reply),
            Err(err) => {
                warn!(attempt, retry_limit, err = %err, "policy call failed");
                last_error = format!("{err:#}");
            }
        }
    }
    Err(PolicyUnavailable {
        time: t,
        attempts: retry_limit,
        last_error,
    }
    .into())
}
