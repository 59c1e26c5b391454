//! The `RampingVuExecutor` and its components, providing a stage-based
//! virtual-user execution model.
//!
//! Each [`Stage`] names a target number of concurrently looping virtual users
//! (VUs) and the duration over which the governor moves linearly from the
//! previous target to it.
//!
//! This design separates **scheduling** (governor task) from **work
//! execution** (worker tasks) and keeps the hot path in workers focused on
//! calling the scenario `action`.
//!
//! # High-level flow
//! 1. A shared execution context is created holding the run state and the
//!    current VU target, both as `watch` channels.
//! 2. The governor task is spawned. Every `tick` it recomputes the target
//!    from the stages and publishes it.
//! 3. One worker per VU slot is spawned (the highest target any stage
//!    reaches). Worker `i` runs iterations back to back while the target is
//!    above `i` and idles otherwise.
//! 4. When the governor finishes, the run state moves to draining: workers
//!    start no new iteration, in-flight iterations get `graceful_ramp_down`
//!    to complete and are abandoned after that.
//! 5. Worker-local aggregates are merged into the result.
//!
//! # Interpolation
//! For a stage going from `start` to `end` VUs over `duration`, at `elapsed`:
//!
//! ```text
//! t = min(elapsed / duration, 1)
//! vus(t) = round(start + (end - start) * t)
//! ```
use tokio::task::JoinHandle;
use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::Executor;
use crate::{aggregate::Aggregate, error::Error, scenario::Scenario};
use internals::*;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};

/// A stage defines a target number of virtual users and how long to ramp to
/// that target.
///
/// `Stage::new(Duration::from_secs(60), 200)` ramps to 200 VUs over a minute.
/// A stage with `Duration::ZERO` jumps to its target instantly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "crate::config::serde_duration")]
    pub duration: Duration,
    /// Concurrent virtual users
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Executor that keeps a ramping number of virtual users looping over the
/// scenario action.
///
/// # Tuning knobs
///
/// - `start_vus`: active VUs before the first stage starts.
/// - `tick`: granularity of governor updates. Target changes land at most one
///   tick late.
/// - `graceful_ramp_down`: how long in-flight iterations may run once the
///   stages are over.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RampingVuExecutor {
    #[builder(default = 0)]
    pub start_vus: usize,
    /// The sequence of VU stages to execute.
    pub stages: Vec<Stage>,
    #[builder(default = Duration::from_millis(100))]
    pub tick: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub graceful_ramp_down: Duration,
}

impl RampingVuExecutor {
    /// Number of worker tasks needed: the largest target ever requested.
    pub fn max_vus(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, usize::max)
    }

    /// Length of the stages, not counting the graceful ramp-down.
    pub fn duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}

impl<A, F, Fut> Executor<A, F, Fut> for RampingVuExecutor
where
    Self: Send + Sync + Sized,
    A: Aggregate + 'static,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    type Error = Error;

    async fn exec(&self, scenario: &Scenario<A, F, Fut>) -> Result<A, Self::Error> {
        let (ctx, Control { state, target }) = ExecutionContext::new(self.start_vus);

        tracing::debug!("Spawning VU governor task...");
        let governor = tokio::spawn(vu_governor_task(
            ctx.clone(),
            target,
            self.start_vus,
            self.stages.clone(),
            self.tick,
        ));

        let workers = self.max_vus();
        tracing::debug!("Spawning {workers} workers...");
        let handles: Vec<JoinHandle<A>> =
            spawn_workers(ctx.clone(), workers, scenario.action.clone());

        tracing::info!(
            "Running scenario: {} ({} VUs max over {})",
            scenario.name,
            workers,
            humantime::format_duration(self.duration())
        );
        state.send(RunState::Running).map_err(|_| Error::Shutdown)?;

        // The governor task ending means the stages are over
        if let Err(e) = governor.await {
            tracing::error!("Governor task failed: {e}");
        }
        tracing::info!(
            "Stages of {} finished, draining for up to {}",
            scenario.name,
            humantime::format_duration(self.graceful_ramp_down)
        );
        state.send(RunState::Draining).map_err(|_| Error::Shutdown)?;

        let joined = join_all(handles);
        tokio::pin!(joined);
        let results = tokio::select! {
            results = &mut joined => results,
            _ = tokio::time::sleep(self.graceful_ramp_down) => {
                tracing::debug!("Graceful ramp-down of {} expired, stopping iterations", scenario.name);
                state.send(RunState::Stopped).map_err(|_| Error::Shutdown)?;
                joined.await
            }
        };

        tracing::debug!("Processing results...");
        let mut final_agg = A::new();
        for res in results {
            match res {
                Ok(agg) => final_agg.merge(agg),
                Err(e) => {
                    // keep the other workers' data rather than losing the run
                    tracing::error!("Worker panicked with error: {e}");
                }
            }
        }

        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(final_agg)
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Internal components for the `RampingVuExecutor`.
/// Encapsulated in a module to allow conditional exposure via `#[cfg(feature = "internals")]`.
mod internals {
    use super::*;
    use tokio::sync::watch::{Receiver, Sender, channel};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RunState {
        /// Workers are spawned but wait for the start signal.
        Pending,
        Running,
        /// No new iterations; in-flight ones may complete.
        Draining,
        /// In-flight iterations are abandoned.
        Stopped,
    }

    impl RunState {
        pub fn is_finishing(&self) -> bool {
            matches!(self, RunState::Draining | RunState::Stopped)
        }
    }

    /// Shared execution state for the governor and all worker tasks.
    #[derive(Clone)]
    pub struct ExecutionContext {
        pub state: Receiver<RunState>,
        /// Number of VU slots that should currently be iterating.
        pub target: Receiver<usize>,
    }

    /// Sending halves kept by the executor.
    pub struct Control {
        pub state: Sender<RunState>,
        pub target: Sender<usize>,
    }

    impl ExecutionContext {
        pub fn new(start_vus: usize) -> (Self, Control) {
            let (state_tx, state_rx) = channel(RunState::Pending);
            let (target_tx, target_rx) = channel(start_vus);
            (
                Self {
                    state: state_rx,
                    target: target_rx,
                },
                Control {
                    state: state_tx,
                    target: target_tx,
                },
            )
        }
    }

    /// Governor task publishing the VU target according to the stages.
    pub async fn vu_governor_task(
        mut ctx: ExecutionContext,
        target: Sender<usize>,
        start_vus: usize,
        stages: Vec<Stage>,
        tick: Duration,
    ) {
        if ctx
            .state
            .wait_for(|s| *s != RunState::Pending)
            .await
            .is_err()
        {
            return;
        }
        tracing::debug!("Governor task started.");

        let main_task = async {
            let mut vus = start_vus;
            let j = stages.len();
            for (i, stage) in stages.into_iter().enumerate() {
                tracing::debug!("Starting stage: {}/{j} -> {} VUs", i + 1, stage.target);
                if stage.duration.is_zero() {
                    vus = stage.target;
                    target.send_replace(vus);
                    continue;
                }

                let stage_start = Instant::now();
                let mut next_tick = stage_start;
                loop {
                    let elapsed = Instant::now().duration_since(stage_start);
                    if elapsed >= stage.duration {
                        break;
                    }
                    next_tick += tick;

                    let now = calc_target_vus(elapsed, stage.duration, vus, stage.target);
                    target.send_if_modified(|current| {
                        let changed = *current != now;
                        *current = now;
                        changed
                    });
                    tokio::time::sleep_until(next_tick).await;
                }
                // the next stage starts from this stage's exact target
                vus = stage.target;
                target.send_replace(vus);
            }
        };

        tokio::select! {
            _ = main_task => {
                tracing::debug!("Governor task finished all stages.");
            }
            _ = ctx.state.wait_for(|s| s.is_finishing()) => {
                tracing::debug!("Governor received shutdown signal.");
            }
        };
    }

    /// Pure function computing the VU target at `elapsed` into a stage.
    pub fn calc_target_vus(
        elapsed: Duration,
        stage_duration: Duration,
        start_vus: usize,
        end_vus: usize,
    ) -> usize {
        if stage_duration.is_zero() {
            return end_vus;
        }
        // Interpolation factor [0.0..1.0]
        let t = (elapsed.as_secs_f64() / stage_duration.as_secs_f64()).min(1.0);
        let (start, end) = (start_vus as f64, end_vus as f64);
        (start + (end - start) * t).round().max(0.0) as usize
    }

    /// Spawns `workers` Tokio tasks, one per VU slot.
    ///
    /// Worker `i` iterates while the target is above `i`, and returns its
    /// aggregate when the run drains.
    pub fn spawn_workers<A, F, Fut>(
        ctx: ExecutionContext,
        workers: usize,
        action: F,
    ) -> Vec<JoinHandle<A>>
    where
        A: Aggregate + 'static,
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = A::Metric> + Send + 'static,
    {
        (0..workers)
            .map(|i| {
                let mut state = ctx.state.clone();
                let mut target = ctx.target.clone();
                let action = action.clone();
                tokio::spawn(async move {
                    let mut agg = A::new();
                    if state.wait_for(|s| *s != RunState::Pending).await.is_err() {
                        return agg;
                    }
                    tracing::trace!("Worker {i} started.");

                    loop {
                        let active = tokio::select! {
                            active = async { target.wait_for(|t| *t > i).await.is_ok() } => active,
                            _ = async { state.wait_for(|s| s.is_finishing()).await.is_ok() } => false,
                        };
                        if !active || state.borrow().is_finishing() {
                            break;
                        }

                        let abandoned = tokio::select! {
                            metric = action() => {
                                agg.consume(&metric);
                                false
                            }
                            _ = async { state.wait_for(|s| *s == RunState::Stopped).await.is_ok() } => true,
                        };
                        if abandoned {
                            tracing::debug!("Worker {i} abandoned its iteration.");
                            break;
                        }
                    }

                    tracing::trace!("Worker {i} shutting down.");
                    agg
                })
            })
            .collect()
    }
}
