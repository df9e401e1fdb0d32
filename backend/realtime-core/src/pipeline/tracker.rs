use crate::pipeline::{Phase, PhaseRecord, PhaseStatus};
use crate::protocol::payloads::PipelineUpdate;

use log::{debug, trace};

/// Identifies one run. A new run gets a new id; calls carrying an older id are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    InProgress,
    Delivered,
    Failed,
}

impl RunOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunOutcome::InProgress)
    }
}

/// Read-only view of the tracker for rendering.
///
/// `outcome == None` means no run is tracked (never started, or cleared).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub question_id: Option<String>,
    pub steps: Vec<PhaseRecord>,
    pub current_phase: Option<Phase>,
    pub outcome: Option<RunOutcome>,
}

impl PipelineSnapshot {
    pub fn phases(&self) -> Vec<Phase> {
        self.steps.iter().map(|step| step.phase).collect()
    }
}

#[derive(Debug)]
struct PipelineRun {
    id: RunId,
    question_id: Option<String>,
    steps: Vec<PhaseRecord>,
    current_phase: Option<Phase>,
    outcome: RunOutcome,
}

impl PipelineRun {
    fn next_phase(&self) -> Phase {
        self.steps
            .last()
            .and_then(|step| step.phase.next())
            .unwrap_or(Phase::Routing)
    }

    fn is_recorded(&self, phase: Phase) -> bool {
        self.steps.iter().any(|step| step.phase == phase)
    }

    /// Close the active step and open `phase`.
    fn record(&mut self, phase: Phase, status: PhaseStatus) {
        if let Some(last) = self.steps.last_mut()
            && last.status == PhaseStatus::Active
        {
            last.status = PhaseStatus::Complete;
        }
        self.steps.push(PhaseRecord::new(phase, status));
        if self.current_phase.is_none_or(|current| current < phase) {
            self.current_phase = Some(phase);
        }
    }
}

/// Single-run pipeline state machine.
///
/// Phases are recorded only in canonical order and never twice. Only one run is
/// tracked; [`start`](Self::start) discards whatever was there.
#[derive(Debug, Default)]
pub struct PipelineTracker {
    generation: u64,
    run: Option<PipelineRun>,
}

impl PipelineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new run; `routing` becomes active immediately.
    pub fn start(&mut self, question_id: Option<String>) -> RunId {
        self.generation += 1;
        let id = RunId(self.generation);

        if let Some(stale) = self.run.take() {
            debug!("Discarding pipeline run {:?} for new submission", stale.id);
        }

        let mut run = PipelineRun {
            id,
            question_id,
            steps: Vec::with_capacity(Phase::CANONICAL.len()),
            current_phase: None,
            outcome: RunOutcome::InProgress,
        };
        run.record(Phase::Routing, PhaseStatus::Active);
        self.run = Some(run);

        id
    }

    /// Optimistically enter `phase`.
    ///
    /// Only the next canonical phase before `delivered` is accepted; returns
    /// `false` for a stale run, a finished run, or an out-of-order phase.
    pub fn advance(&mut self, id: RunId, phase: Phase) -> bool {
        let Some(run) = self.active_run(id) else {
            return false;
        };

        if phase == Phase::Delivered || run.next_phase() != phase {
            trace!("Ignoring out-of-order phase {phase}");
            return false;
        }

        run.record(phase, PhaseStatus::Active);
        true
    }

    /// Apply an authoritative server update for the current run's question.
    ///
    /// A recorded phase takes the reported status, if one was understood. An
    /// unrecorded later phase only moves `current_phase` forward; steps stay in
    /// canonical order. Returns `true` if anything changed.
    pub fn apply_update(&mut self, update: &PipelineUpdate) -> bool {
        let Some(run) = self.run.as_mut() else {
            return false;
        };

        if run.outcome.is_terminal()
            || run.question_id.as_deref() != Some(update.question_id.as_str())
        {
            return false;
        }

        let mut changed = false;

        if let Some(status) = update.status
            && let Some(step) = run.steps.iter_mut().find(|step| step.phase == update.phase)
            && step.status != status
        {
            step.status = status;
            changed = true;
        }

        if run.current_phase.is_none_or(|current| current < update.phase) {
            run.current_phase = Some(update.phase);
            changed = true;
        }

        if changed {
            debug!(
                "Server moved question {} to {} ({:?})",
                update.question_id, update.phase, update.status
            );
        }

        changed
    }

    /// Finish the run as delivered.
    ///
    /// Any phase not yet recorded is appended in canonical order first, so a
    /// delivered run always holds all four phases exactly once.
    pub fn complete(&mut self, id: RunId) -> bool {
        let Some(run) = self.active_run(id) else {
            return false;
        };

        for phase in Phase::CANONICAL {
            if !run.is_recorded(phase) {
                run.record(phase, PhaseStatus::Complete);
            }
        }
        run.steps
            .iter_mut()
            .for_each(|step| step.status = PhaseStatus::Complete);
        run.current_phase = Some(Phase::Delivered);
        run.outcome = RunOutcome::Delivered;

        true
    }

    /// Finish the run as failed; no `delivered` step is recorded.
    pub fn fail(&mut self, id: RunId) -> bool {
        let Some(run) = self.active_run(id) else {
            return false;
        };

        if let Some(last) = run.steps.last_mut() {
            last.status = PhaseStatus::Failed;
        }
        run.outcome = RunOutcome::Failed;

        true
    }

    /// Drop a finished run. Ignored if `id` is stale or the run is still in progress.
    pub fn clear(&mut self, id: RunId) -> bool {
        match &self.run {
            Some(run) if run.id == id && run.outcome.is_terminal() => {
                self.run = None;
                true
            }
            _ => false,
        }
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.run.as_ref().map(|run| run.id)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        match &self.run {
            Some(run) => PipelineSnapshot {
                question_id: run.question_id.clone(),
                steps: run.steps.clone(),
                current_phase: run.current_phase,
                outcome: Some(run.outcome),
            },
            None => PipelineSnapshot::default(),
        }
    }

    fn active_run(&mut self, id: RunId) -> Option<&mut PipelineRun> {
        self.run
            .as_mut()
            .filter(|run| run.id == id && !run.outcome.is_terminal())
    }
}
