// Timing tests for the pipeline driver.
// Run on a paused clock: every sleep auto-advances virtual time.

use crate::config::PipelineConfig;
use crate::pipeline::{Phase, PhaseRecord, PhaseStatus, PipelineDriver, RunOutcome};
use crate::protocol::events;
use crate::registry::EventRegistry;

use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::sleep;

fn driver() -> PipelineDriver {
    PipelineDriver::new(PipelineConfig::default(), None)
}

/// Submit a request that resolves after `after_ms` with `outcome`.
fn submit_after(
    driver: &PipelineDriver,
    question_id: &str,
    after_ms: u64,
    outcome: Result<&'static str, &'static str>,
) -> JoinHandle<Result<&'static str, &'static str>> {
    let driver = driver.clone();
    let question_id = question_id.to_string();
    tokio::spawn(async move {
        driver
            .submit(question_id, async move {
                sleep(Duration::from_millis(after_ms)).await;
                outcome
            })
            .await
    })
}

async fn at(ms_since_start: u64, elapsed: &mut u64) {
    sleep(Duration::from_millis(ms_since_start - *elapsed)).await;
    *elapsed = ms_since_start;
}

/// **VALUE**: The optimistic phases follow the 800/1500/1000 ms schedule and the
/// run is delivered only after the animation finishes.
///
/// **WHY THIS MATTERS**: The indicator must look the same whether the answer comes
/// back fast or slow; a fast answer must not cut the animation short.
///
/// **BUG THIS CATCHES**: Would catch delivering as soon as the request resolves, or
/// timers that advance on the wrong delays.
#[tokio::test(start_paused = true)]
async fn given_answer_before_animation_ends_when_submitted_then_delivered_after_animation() {
    // GIVEN: A request that answers at 2.0s
    let driver = driver();
    let mut elapsed = 0;
    let task = submit_after(&driver, "q1", 2000, Ok("answer"));

    // THEN: routing active at start
    at(10, &mut elapsed).await;
    assert_eq!(driver.snapshot().phases(), vec![Phase::Routing]);

    // THEN: drafting active after 0.8s
    at(900, &mut elapsed).await;
    assert_eq!(
        driver.snapshot().steps,
        vec![
            PhaseRecord::new(Phase::Routing, PhaseStatus::Complete),
            PhaseRecord::new(Phase::Drafting, PhaseStatus::Active),
        ]
    );

    // THEN: verifying active after 2.3s, still in progress although answered
    at(2400, &mut elapsed).await;
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.current_phase, Some(Phase::Verifying));
    assert_eq!(snapshot.outcome, Some(RunOutcome::InProgress));

    // THEN: delivered once the animation ends at 3.3s
    at(3400, &mut elapsed).await;
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.phases(), Phase::CANONICAL.to_vec());
    assert_eq!(snapshot.outcome, Some(RunOutcome::Delivered));
    assert_eq!(task.await.unwrap(), Ok("answer"));
}

/// **VALUE**: A slow answer keeps the run at verifying until it arrives.
#[tokio::test(start_paused = true)]
async fn given_slow_answer_when_animation_done_then_waits_at_verifying() {
    // GIVEN: A request that answers at 5s
    let driver = driver();
    let mut elapsed = 0;
    let _task = submit_after(&driver, "q1", 5000, Ok("late"));

    // THEN: Still verifying at 4s
    at(4000, &mut elapsed).await;
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.current_phase, Some(Phase::Verifying));
    assert_eq!(snapshot.outcome, Some(RunOutcome::InProgress));

    // THEN: Delivered right after the answer
    at(5100, &mut elapsed).await;
    assert_eq!(driver.snapshot().outcome, Some(RunOutcome::Delivered));
}

/// **VALUE**: A failed request marks the current phase failed and stops the animation.
///
/// **BUG THIS CATCHES**: Would catch a leftover timer advancing a failed run to
/// verifying, or a failed run that still shows delivered.
#[tokio::test(start_paused = true)]
async fn given_request_fails_during_drafting_when_submitted_then_failed_and_animation_stopped() {
    // GIVEN: A request that fails at 1s
    let driver = driver();
    let mut elapsed = 0;
    let task = submit_after(&driver, "q1", 1000, Err("503"));

    // THEN: drafting failed right after
    at(1100, &mut elapsed).await;
    let snapshot = driver.snapshot();
    assert_eq!(
        snapshot.steps.last(),
        Some(&PhaseRecord::new(Phase::Drafting, PhaseStatus::Failed))
    );
    assert_eq!(snapshot.outcome, Some(RunOutcome::Failed));
    assert_eq!(task.await.unwrap(), Err("503"));

    // THEN: No verifying step once its timer would have fired
    at(2500, &mut elapsed).await;
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.phases(), vec![Phase::Routing, Phase::Drafting]);
}

/// **VALUE**: A finished run is cleared 2s after it ends.
#[tokio::test(start_paused = true)]
async fn given_finished_run_when_grace_period_elapses_then_cleared() {
    // GIVEN: A run that fails at 0.5s
    let driver = driver();
    let mut elapsed = 0;
    let _task = submit_after(&driver, "q1", 500, Err("nope"));

    // THEN: Still visible before the grace period ends
    at(2400, &mut elapsed).await;
    assert_eq!(driver.snapshot().outcome, Some(RunOutcome::Failed));

    // THEN: Gone after it
    at(2600, &mut elapsed).await;
    assert_eq!(driver.snapshot(), Default::default());
}

/// **VALUE**: A second submission replaces the first; the first run's timers are ignored.
///
/// **WHY THIS MATTERS**: Users resubmit while a slow answer is in flight; the
/// indicator must track the new question only.
///
/// **BUG THIS CATCHES**: Would catch timers from the first run advancing the second.
#[tokio::test(start_paused = true)]
async fn given_run_in_progress_when_new_submission_then_old_run_discarded() {
    // GIVEN: Question a in flight
    let driver = driver();
    let mut elapsed = 0;
    let _first = submit_after(&driver, "a", 10_000, Ok("a"));

    // WHEN: Question b is submitted at 0.5s
    at(500, &mut elapsed).await;
    let _second = submit_after(&driver, "b", 10_000, Ok("b"));

    // THEN: At 1s (a's drafting timer fired at 0.8s) b is still at routing
    at(1000, &mut elapsed).await;
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.question_id.as_deref(), Some("b"));
    assert_eq!(snapshot.phases(), vec![Phase::Routing]);

    // THEN: b reaches drafting on its own schedule
    at(1400, &mut elapsed).await;
    assert_eq!(driver.snapshot().current_phase, Some(Phase::Drafting));
}

/// **VALUE**: `pipeline_update` frames for the active question reach the tracker;
/// other questions are filtered out.
#[tokio::test(start_paused = true)]
async fn given_attached_driver_when_pipeline_update_dispatched_then_applied_for_matching_question() {
    // GIVEN: A driver attached to a registry with a run for q1
    let driver = driver();
    let registry = EventRegistry::new();
    let _subscription = driver.attach(&registry);
    let mut elapsed = 0;
    let _task = submit_after(&driver, "q1", 10_000, Ok("x"));
    at(100, &mut elapsed).await;

    // WHEN: An update for another question, then one for q1
    registry.dispatch(
        events::PIPELINE_UPDATE,
        &json!({"question_id": "q2", "step": "verifying", "status": "active"}),
    );
    assert_eq!(driver.snapshot().current_phase, Some(Phase::Routing));
    registry.dispatch(
        events::PIPELINE_UPDATE,
        &json!({"question_id": "q1", "step": "verifying", "status": "active"}),
    );

    // THEN: Only q1's update moved the phase; watchers see it
    assert_eq!(driver.snapshot().current_phase, Some(Phase::Verifying));
    assert_eq!(driver.watch().borrow().current_phase, Some(Phase::Verifying));
}

/// **VALUE**: An update whose status this client does not recognise still moves
/// the phase forward.
///
/// **WHY THIS MATTERS**: The server's progress always wins over the local
/// animation, even when it reports a status name such as `in_progress`.
///
/// **BUG THIS CATCHES**: Would catch the listener rejecting the payload, leaving
/// the indicator stuck at `routing`.
#[tokio::test(start_paused = true)]
async fn given_update_with_unknown_status_when_dispatched_then_phase_still_advances() {
    // GIVEN: A run for Q1 still at routing
    let driver = driver();
    let registry = EventRegistry::new();
    let _subscription = driver.attach(&registry);
    let mut elapsed = 0;
    let _task = submit_after(&driver, "Q1", 10_000, Ok("x"));
    at(100, &mut elapsed).await;

    // WHEN: An update with an unknown status, then one with a null status
    let delivered_unknown = registry.dispatch(
        events::PIPELINE_UPDATE,
        &json!({"question_id": "Q1", "step": "verifying", "status": "in_progress"}),
    );
    let delivered_null = registry.dispatch(
        events::PIPELINE_UPDATE,
        &json!({"question_id": "Q1", "step": "verifying", "status": null}),
    );

    // THEN: Both were handled and the phase moved to verifying
    assert_eq!(delivered_unknown, 1);
    assert_eq!(delivered_null, 1);
    let snapshot = driver.snapshot();
    assert_eq!(snapshot.current_phase, Some(Phase::Verifying));

    // AND: The recorded routing step keeps its own status
    assert_eq!(
        snapshot.steps,
        vec![PhaseRecord::new(Phase::Routing, PhaseStatus::Active)]
    );
}
