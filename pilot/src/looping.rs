//! Multi-tick looping for a single run.

use anyhow::{Context, Result};

use crate::core::parser::Action;
use crate::core::time::TimeKey;
use crate::io::config::PilotConfig;
use crate::io::depth::DepthSource;
use crate::io::layout::{DatasetPaths, RunPaths};
use crate::io::policy::PolicyClient;
use crate::io::state_store::DurableStateLog;
use crate::step::{PolicyUnavailable, TickOutcome, run_tick};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStop {
    /// The run clock reached the label-derived time bound.
    TimeBoundExceeded { elapsed: TimeKey, bound: f64 },
    /// The policy emitted `[STOP]` the configured number of times.
    RepeatedStop { stops: u32, at: TimeKey },
    /// The policy boundary failed every allowed attempt for one tick.
    PolicyUnavailable { at: TimeKey, attempts: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub ticks_executed: u32,
    pub stop: LoopStop,
}

/// Drive ticks from the last persisted snapshot until a termination
/// condition fires.
///
/// Termination is checked before each tick; the time bound wins over a
/// pending stop count. Each tick persists its snapshot and decision record
/// before the clock advances, so an abort between ticks never leaves a
/// partial step behind.
pub fn run_loop<P: PolicyClient, D: DepthSource, F: FnMut(&TickOutcome)>(
    dataset: &DatasetPaths,
    run: &RunPaths,
    cfg: &PilotConfig,
    policy: &P,
    depth: &D,
    time_bound: f64,
    mut on_tick: F,
) -> Result<LoopOutcome> {
    // The loop resumes from the last appended snapshot; a fresh run starts at
    // the seeded 0'0 snapshot. run_tick reloads the log per tick; redundant
    // here, but the policy call dominates runtime.
    let state = DurableStateLog::open(&run.state_log_path)
        .with_context(|| format!("load {}", run.state_log_path.display()))?;
    let mut t = state
        .log()
        .last()
        .map(|snapshot| snapshot.time)
        .unwrap_or_else(TimeKey::zero);

    let mut stops = 0u32;
    let mut ticks_executed = 0u32;

    loop {
        if t.value() >= time_bound {
            return Ok(LoopOutcome {
                ticks_executed,
                stop: LoopStop::TimeBoundExceeded {
                    elapsed: t,
                    bound: time_bound,
                },
            });
        }

        match run_tick(dataset, run, cfg, policy, depth, t) {
            Ok(tick) => {
                ticks_executed += 1;
                on_tick(&tick);
                if tick.action == Some(Action::Stop) {
                    stops += 1;
                    if stops >= cfg.stop_threshold {
                        return Ok(LoopOutcome {
                            ticks_executed,
                            stop: LoopStop::RepeatedStop { stops, at: t },
                        });
                    }
                }
                t = tick.next_time;
            }
            Err(err) => {
                if let Some(unavailable) = err.downcast_ref::<PolicyUnavailable>() {
                    return Ok(LoopOutcome {
                        ticks_executed,
                        stop: LoopStop::PolicyUnavailable {
                            at: unavailable.time,
                            attempts: unavailable.attempts,
                        },
                    });
                }
                return Err(err);
            }
        }
    }
}
