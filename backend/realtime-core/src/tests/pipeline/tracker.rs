// Unit tests for the pipeline state machine

use crate::pipeline::{Phase, PhaseRecord, PhaseStatus, PipelineTracker, RunOutcome};
use crate::protocol::payloads::PipelineUpdate;

fn update(question_id: &str, phase: Phase, status: PhaseStatus) -> PipelineUpdate {
    PipelineUpdate {
        question_id: question_id.to_string(),
        phase,
        status: Some(status),
    }
}

/// **VALUE**: Starting a run makes `routing` active immediately.
#[test]
fn given_new_tracker_when_start_then_routing_active() {
    // GIVEN: A fresh tracker
    let mut tracker = PipelineTracker::new();

    // WHEN: A run starts
    tracker.start(Some("q-1".to_string()));

    // THEN: routing is the only, active step
    let snapshot = tracker.snapshot();
    assert_eq!(
        snapshot.steps,
        vec![PhaseRecord::new(Phase::Routing, PhaseStatus::Active)]
    );
    assert_eq!(snapshot.current_phase, Some(Phase::Routing));
    assert_eq!(snapshot.outcome, Some(RunOutcome::InProgress));
    assert_eq!(snapshot.question_id.as_deref(), Some("q-1"));
}

/// **VALUE**: Advancing closes the previous step and opens the next.
///
/// **BUG THIS CATCHES**: Would catch two steps shown as active at once.
#[test]
fn given_routing_when_advance_to_drafting_then_routing_complete() {
    // GIVEN: A started run
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(None);

    // WHEN: Drafting begins
    let advanced = tracker.advance(run, Phase::Drafting);

    // THEN: routing complete, drafting active
    assert!(advanced);
    assert_eq!(
        tracker.snapshot().steps,
        vec![
            PhaseRecord::new(Phase::Routing, PhaseStatus::Complete),
            PhaseRecord::new(Phase::Drafting, PhaseStatus::Active),
        ]
    );
}

/// **VALUE**: Phases can only be entered in canonical order, never twice, never `delivered`.
///
/// **WHY THIS MATTERS**: Timers and the request race each other; out-of-order calls
/// must not produce `routing, verifying` or a duplicate `drafting`.
///
/// **BUG THIS CATCHES**: Would catch an `advance` that appends whatever it is given.
#[test]
fn given_run_when_advance_out_of_order_then_rejected() {
    // GIVEN: A run at routing
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(None);

    // WHEN/THEN: Skipping ahead, delivering, and repeating are rejected
    assert!(!tracker.advance(run, Phase::Verifying));
    assert!(!tracker.advance(run, Phase::Delivered));
    assert!(!tracker.advance(run, Phase::Routing));
    assert!(tracker.advance(run, Phase::Drafting));
    assert!(!tracker.advance(run, Phase::Drafting));

    assert_eq!(tracker.snapshot().phases(), vec![Phase::Routing, Phase::Drafting]);
}

/// **VALUE**: Completing early fills in the missing phases in order.
///
/// **WHY THIS MATTERS**: A fast answer can arrive before the animation reaches
/// `verifying`; the finished run must still show all four phases exactly once.
///
/// **BUG THIS CATCHES**: Would catch `complete` jumping straight to delivered.
#[test]
fn given_run_at_drafting_when_complete_then_all_phases_once_and_complete() {
    // GIVEN: A run at drafting
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(None);
    tracker.advance(run, Phase::Drafting);

    // WHEN: Completed
    assert!(tracker.complete(run));

    // THEN: Four complete steps, delivered
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.phases(), Phase::CANONICAL.to_vec());
    assert!(snapshot
        .steps
        .iter()
        .all(|step| step.status == PhaseStatus::Complete));
    assert_eq!(snapshot.current_phase, Some(Phase::Delivered));
    assert_eq!(snapshot.outcome, Some(RunOutcome::Delivered));
}

/// **VALUE**: Failing marks the current step failed and never records delivered.
#[test]
fn given_run_at_drafting_when_fail_then_drafting_failed_and_no_delivered() {
    // GIVEN: A run at drafting
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(None);
    tracker.advance(run, Phase::Drafting);

    // WHEN: The request fails
    assert!(tracker.fail(run));

    // THEN: drafting failed, terminal, further changes ignored
    let snapshot = tracker.snapshot();
    assert_eq!(
        snapshot.steps.last(),
        Some(&PhaseRecord::new(Phase::Drafting, PhaseStatus::Failed))
    );
    assert_eq!(snapshot.outcome, Some(RunOutcome::Failed));
    assert!(!tracker.advance(run, Phase::Verifying));
    assert!(!tracker.complete(run));
    assert!(!snapshot.phases().contains(&Phase::Delivered));
}

/// **VALUE**: A new submission discards the previous run; calls for the old run are ignored.
///
/// **BUG THIS CATCHES**: Would catch a late timer from query A advancing query B.
#[test]
fn given_stale_run_id_when_advance_then_ignored() {
    // GIVEN: Run A replaced by run B
    let mut tracker = PipelineTracker::new();
    let stale = tracker.start(Some("a".to_string()));
    let current = tracker.start(Some("b".to_string()));

    // WHEN: A's timer fires
    let advanced = tracker.advance(stale, Phase::Drafting);

    // THEN: B is untouched
    assert!(!advanced);
    assert_ne!(stale, current);
    assert_eq!(tracker.current_run(), Some(current));
    assert_eq!(tracker.snapshot().phases(), vec![Phase::Routing]);
    assert!(!tracker.fail(stale));
    assert!(!tracker.clear(stale));
}

/// **VALUE**: Clearing only removes a finished run with the matching id.
#[test]
fn given_in_progress_run_when_clear_then_kept_until_terminal() {
    // GIVEN: A running run
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(None);

    // WHEN/THEN: Clear refused while running, accepted after completion
    assert!(!tracker.clear(run));
    tracker.complete(run);
    assert!(tracker.clear(run));
    assert_eq!(tracker.snapshot(), Default::default());
    assert_eq!(tracker.current_run(), None);
}

/// **VALUE**: A server update sets the status of a recorded step and moves the phase forward.
///
/// **WHY THIS MATTERS**: The server is authoritative; its status wins over the
/// optimistic one, but steps still stay in canonical order.
///
/// **BUG THIS CATCHES**: Would catch server updates appending steps out of order.
#[test]
fn given_matching_update_when_applied_then_status_and_phase_updated() {
    // GIVEN: A run for q-9 at routing
    let mut tracker = PipelineTracker::new();
    tracker.start(Some("q-9".to_string()));

    // WHEN: Server reports routing complete, then verifying active
    assert!(tracker.apply_update(&update("q-9", Phase::Routing, PhaseStatus::Complete)));
    assert!(tracker.apply_update(&update("q-9", Phase::Verifying, PhaseStatus::Active)));

    // THEN: routing complete, phase moved forward, no step appended
    let snapshot = tracker.snapshot();
    assert_eq!(
        snapshot.steps,
        vec![PhaseRecord::new(Phase::Routing, PhaseStatus::Complete)]
    );
    assert_eq!(snapshot.current_phase, Some(Phase::Verifying));
}

/// **VALUE**: Updates never move the phase backward, and other questions are ignored.
#[test]
fn given_update_for_earlier_phase_or_other_question_when_applied_then_ignored() {
    // GIVEN: A run for q-1 at drafting
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(Some("q-1".to_string()));
    tracker.advance(run, Phase::Drafting);

    // WHEN/THEN: Other question ignored
    assert!(!tracker.apply_update(&update("q-2", Phase::Verifying, PhaseStatus::Active)));

    // WHEN/THEN: Earlier phase with unchanged status ignored
    assert!(!tracker.apply_update(&update("q-1", Phase::Routing, PhaseStatus::Complete)));
    assert_eq!(tracker.snapshot().current_phase, Some(Phase::Drafting));
}

/// **VALUE**: Updates after a terminal outcome are ignored.
#[test]
fn given_delivered_run_when_update_then_ignored() {
    // GIVEN: A delivered run
    let mut tracker = PipelineTracker::new();
    let run = tracker.start(Some("q-1".to_string()));
    tracker.complete(run);

    // WHEN: A late failure update arrives
    let applied = tracker.apply_update(&update("q-1", Phase::Verifying, PhaseStatus::Failed));

    // THEN: Still delivered
    assert!(!applied);
    assert_eq!(tracker.snapshot().outcome, Some(RunOutcome::Delivered));
}
