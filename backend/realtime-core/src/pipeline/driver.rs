use crate::config::PipelineConfig;
use crate::connection::ConnectionManager;
use crate::error::listener::ListenerError;
use crate::pipeline::{Phase, PipelineSnapshot, PipelineTracker, RunId};
use crate::protocol::events;
use crate::protocol::payloads::PipelineUpdate;
use crate::registry::{EventRegistry, Subscription};

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::sleep as TokioSleep;

/// Optimistic phases after `routing`, in the order the animation enters them.
const ANIMATED_PHASES: [Phase; 2] = [Phase::Drafting, Phase::Verifying];

/// Drives a [`PipelineTracker`] from a pending query.
///
/// [`submit`](Self::submit) starts a run, animates the optimistic phases on
/// timers while the request is in flight, then settles the run as delivered or
/// failed and clears it after the configured grace period. Every change is
/// published as a [`PipelineSnapshot`] on a watch channel.
///
/// Cheap to clone; all clones drive the same tracker.
#[derive(Clone)]
pub struct PipelineDriver {
    tracker: Arc<Mutex<PipelineTracker>>,
    snapshots: Arc<watch::Sender<PipelineSnapshot>>,
    config: PipelineConfig,
    connection: Option<ConnectionManager>,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig, connection: Option<ConnectionManager>) -> Self {
        let (snapshots, _) = watch::channel(PipelineSnapshot::default());
        Self {
            tracker: Arc::new(Mutex::new(PipelineTracker::new())),
            snapshots: Arc::new(snapshots),
            config,
            connection,
        }
    }

    /// Track `request` as a pipeline run for `question_id`.
    ///
    /// The result of `request` is returned unchanged. On success the run is
    /// marked delivered once the optimistic animation has finished; on failure
    /// it ends failed immediately. Either way it is cleared after the grace
    /// period unless a newer run has replaced it.
    pub async fn submit<F, T, E>(&self, question_id: impl Into<String>, request: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let question_id = question_id.into();
        let run = self.update(|tracker| tracker.start(Some(question_id.clone())));
        info!("Pipeline run started for question {question_id}");

        if let Some(connection) = &self.connection
            && !connection.subscribe_pipeline(&question_id)
        {
            debug!("Pipeline subscription for {question_id} not sent (not connected)");
        }

        let animation = tokio::spawn(Self::animate(self.clone(), run));
        let result = request.await;

        match &result {
            Ok(_) => {
                if let Err(e) = animation.await {
                    warn!("Pipeline animation for {question_id} ended abnormally: {e}");
                }
                if self.update(|tracker| tracker.complete(run)) {
                    info!("Pipeline run for question {question_id} delivered");
                }
            }
            Err(_) => {
                animation.abort();
                if self.update(|tracker| tracker.fail(run)) {
                    warn!("Pipeline run for question {question_id} failed");
                }
            }
        }

        self.schedule_cleanup(run);
        result
    }

    /// Feed `pipeline_update` frames from `registry` into the tracker.
    pub fn attach(&self, registry: &EventRegistry) -> Subscription {
        let driver = self.clone();
        registry.subscribe(events::PIPELINE_UPDATE, move |data| {
            let update = PipelineUpdate::deserialize(data)
                .map_err(|e| ListenerError::payload(events::PIPELINE_UPDATE, e.to_string()))?;
            driver.apply_update(&update);
            Ok(())
        })
    }

    pub fn apply_update(&self, update: &PipelineUpdate) -> bool {
        self.update(|tracker| tracker.apply_update(update))
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.tracker().snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.subscribe()
    }

    async fn animate(driver: PipelineDriver, run: RunId) {
        let [routing, drafting, verifying] = driver.config.phase_delays();
        let holds = [routing, drafting];

        for (phase, hold) in ANIMATED_PHASES.into_iter().zip(holds) {
            TokioSleep(hold).await;
            if !driver.update(|tracker| tracker.advance(run, phase)) {
                return;
            }
        }

        TokioSleep(verifying).await;
    }

    fn schedule_cleanup(&self, run: RunId) {
        let driver = self.clone();
        let grace = self.config.cleanup_grace();

        tokio::spawn(async move {
            TokioSleep(grace).await;
            if driver.update(|tracker| tracker.clear(run)) {
                debug!("Pipeline run {run:?} cleared");
            }
        });
    }

    /// Run `mutation` on the tracker and publish the resulting snapshot.
    fn update<R>(&self, mutation: impl FnOnce(&mut PipelineTracker) -> R) -> R {
        let mut tracker = self.tracker();
        let result = mutation(&mut tracker);
        self.snapshots.send_replace(tracker.snapshot());
        result
    }

    fn tracker(&self) -> MutexGuard<'_, PipelineTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
