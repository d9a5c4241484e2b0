//! Loop-level scenario tests for the decision tick and its termination rules.
//!
//! These drive `run_tick` and `run_loop` against scripted policy and depth
//! boundaries to verify end-to-end behavior: merge-at-time, guarded
//! transitions, log append semantics, and every termination reason.

use pilot::core::parser::Action;
use pilot::core::state_log::{StateEntry, StateSnapshot};
use pilot::core::subtask::SubtaskState;
use pilot::core::time::TimeKey;
use pilot::core::transition::TransitionOutcome;
use pilot::io::state_store::{DurableStateLog, load_decisions};
use pilot::io::subtask_store::write_subtask_list;
use pilot::looping::{LoopStop, run_loop};
use pilot::observe::RepresentationUnavailable;
use pilot::step::run_tick;
use pilot::test_support::{
    ScriptedDepth, ScriptedPolicy, ScriptedReply, TestRun, policy_reply, sample_buffer,
    sample_subtasks, test_config,
};

/// Bootstrap the run directly: canonical list plus the all-pending seed.
fn seed_run(run: &TestRun) {
    let subtasks = sample_subtasks();
    write_subtask_list(&run.run_paths().subtasks_path, &subtasks).expect("write subtasks");
    DurableStateLog::create(
        &run.run_paths().state_log_path,
        StateSnapshot::initial(&subtasks),
    )
    .expect("seed state log");
}

fn scripted_depth() -> ScriptedDepth {
    ScriptedDepth {
        buffer: Some(sample_buffer()),
        map: None,
    }
}

/// Scenario A: a declared `pending -> doing` change on the live state is
/// applied and the advanced snapshot records it.
#[test]
fn tick_applies_declared_transition() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(1, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::repeating(
        &policy_reply("[FORWARD]", "Subtask NO.1 changes from pending to doing."),
        1,
    );

    let outcome = run_tick(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        TimeKey::zero(),
    )
    .expect("tick");

    assert_eq!(outcome.action, Some(Action::Forward));
    assert_eq!(
        outcome.transition,
        TransitionOutcome::Applied {
            step: 1,
            from: SubtaskState::Pending,
            to: SubtaskState::Doing,
        }
    );

    let state = DurableStateLog::open(&run.run_paths().state_log_path).expect("open log");
    let snapshots = state.log().snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[1].time, TimeKey::new(0, 2));
    assert_eq!(
        snapshots[1].subtask_list,
        vec![
            StateEntry {
                step: 1,
                state: SubtaskState::Doing,
            },
            StateEntry {
                step: 2,
                state: SubtaskState::Pending,
            },
        ]
    );

    let decisions = load_decisions(&run.run_paths().decisions_path).expect("decisions");
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].time, TimeKey::zero());
    assert_eq!(decisions[0].action.as_deref(), Some("[FORWARD]"));
}

/// Scenario B: a declaration whose old state is wrong is rejected and the
/// advanced snapshot is identical to the prior one.
#[test]
fn tick_rejects_mismatched_declaration() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(1, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::repeating(
        &policy_reply("[FORWARD]", "Subtask NO.1 changes from doing to done."),
        1,
    );

    let outcome = run_tick(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        TimeKey::zero(),
    )
    .expect("tick");

    assert_eq!(
        outcome.transition,
        TransitionOutcome::RejectedMismatch {
            step: 1,
            declared: SubtaskState::Doing,
            actual: SubtaskState::Pending,
        }
    );

    let state = DurableStateLog::open(&run.run_paths().state_log_path).expect("open log");
    let snapshots = state.log().snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].subtask_list, snapshots[1].subtask_list);
}

/// A reply with no parseable declaration advances the clock without touching
/// state.
#[test]
fn tick_survives_unparseable_state_text() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(1, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::repeating(
        &policy_reply("[FORWARD]", "the robot is making good progress"),
        1,
    );

    let outcome = run_tick(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        TimeKey::zero(),
    )
    .expect("tick");

    assert_eq!(outcome.transition, TransitionOutcome::Unparseable);
    let state = DurableStateLog::open(&run.run_paths().state_log_path).expect("open log");
    let snapshots = state.log().snapshots();
    assert_eq!(snapshots[0].subtask_list, snapshots[1].subtask_list);
}

/// A snapshot that omits a canonical step degrades that step to `unknown`
/// instead of halting the run, and the fallback is persisted verbatim.
#[test]
fn tick_degrades_missing_snapshot_steps_to_unknown() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    let subtasks = sample_subtasks();
    write_subtask_list(&run.run_paths().subtasks_path, &subtasks).expect("write subtasks");
    // Partial seed: step 2 is missing from the snapshot.
    DurableStateLog::create(
        &run.run_paths().state_log_path,
        StateSnapshot {
            time: TimeKey::zero(),
            subtask_list: vec![StateEntry {
                step: 1,
                state: SubtaskState::Pending,
            }],
        },
    )
    .expect("seed state log");
    run.write_frames(1, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::repeating(
        &policy_reply("[FORWARD]", "Subtask NO.1 keeps state of pending."),
        1,
    );

    run_tick(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        TimeKey::zero(),
    )
    .expect("tick");

    let state = DurableStateLog::open(&run.run_paths().state_log_path).expect("open log");
    let appended = &state.log().snapshots()[1];
    assert_eq!(appended.subtask_list[1].step, 2);
    assert_eq!(appended.subtask_list[1].state, SubtaskState::Unknown);
}

/// Scenario C: with a labeled stop at 10.0, 0.2 ticks and a 2-tick margin,
/// the loop terminates at or before elapsed 10.4 regardless of the policy.
#[test]
fn loop_stops_at_label_derived_time_bound() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(60, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::repeating(
        &policy_reply("[FORWARD]", "Subtask NO.1 keeps state of pending."),
        60,
    );
    let bound = 10.0 + cfg.tick_interval() * cfg.safety_margin_ticks as f64;

    let outcome = run_loop(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        bound,
        |_| {},
    )
    .expect("loop");

    match outcome.stop {
        LoopStop::TimeBoundExceeded { elapsed, .. } => {
            assert!(elapsed.value() <= 10.4 + 1e-9);
        }
        other => panic!("expected time bound, got {other:?}"),
    }
    assert_eq!(outcome.ticks_executed, 52);
}

/// Scenario D: the third cumulative `[STOP]` terminates the loop, not any
/// earlier occurrence, even when the stops are non-consecutive.
#[test]
fn loop_stops_on_third_cumulative_stop() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(10, cfg.tick_decisteps).expect("frames");

    let keep = "Subtask NO.1 keeps state of pending.";
    let policy = ScriptedPolicy::new(vec![
        ScriptedReply::Text(policy_reply("[STOP]", keep)),
        ScriptedReply::Text(policy_reply("[FORWARD]", keep)),
        ScriptedReply::Text(policy_reply("[STOP]", keep)),
        ScriptedReply::Text(policy_reply("[FORWARD]", keep)),
        ScriptedReply::Text(policy_reply("[STOP]", keep)),
        ScriptedReply::Text(policy_reply("[FORWARD]", keep)),
    ]);

    let outcome = run_loop(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        100.0,
        |_| {},
    )
    .expect("loop");

    assert_eq!(
        outcome.stop,
        LoopStop::RepeatedStop {
            stops: 3,
            at: TimeKey::new(0, 8),
        }
    );
    assert_eq!(outcome.ticks_executed, 5);

    let decisions = load_decisions(&run.run_paths().decisions_path).expect("decisions");
    assert_eq!(decisions.len(), 5);
}

/// Exhausted policy retries terminate the run without persisting a partial
/// tick: the log still ends at the pre-tick snapshot.
#[test]
fn loop_reports_policy_unavailable_without_partial_state() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(1, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::new(vec![
        ScriptedReply::Fail("connection refused".to_string()),
        ScriptedReply::Fail("connection refused".to_string()),
        ScriptedReply::Fail("connection refused".to_string()),
    ]);

    let outcome = run_loop(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &scripted_depth(),
        100.0,
        |_| {},
    )
    .expect("loop");

    assert_eq!(
        outcome.stop,
        LoopStop::PolicyUnavailable {
            at: TimeKey::zero(),
            attempts: cfg.policy.retry_limit,
        }
    );
    assert_eq!(outcome.ticks_executed, 0);

    let state = DurableStateLog::open(&run.run_paths().state_log_path).expect("open log");
    assert_eq!(state.log().snapshots().len(), 1);
    assert!(!run.run_paths().decisions_path.exists());
}

/// A missing required depth artifact aborts the tick with a typed error
/// instead of silently degrading the prompt.
#[test]
fn loop_propagates_missing_depth_artifact() {
    let run = TestRun::new().expect("run");
    let cfg = test_config();
    seed_run(&run);
    run.write_frames(1, cfg.tick_decisteps).expect("frames");

    let policy = ScriptedPolicy::repeating(&policy_reply("[FORWARD]", "keep"), 1);
    let depth = ScriptedDepth {
        buffer: None,
        map: None,
    };

    let err = run_loop(
        &run.dataset(),
        &run.run_paths(),
        &cfg,
        &policy,
        &depth,
        100.0,
        |_| {},
    )
    .expect_err("missing artifact");
    assert!(err.downcast_ref::<RepresentationUnavailable>().is_some());
}
