use std::{future::Future, time::Duration};

use futures::future::join_all;

use super::{Executor, RampingVuExecutor};
use crate::{aggregate::Aggregate, error::Error, scenario::Scenario};

/// One named part of a test: a [`RampingVuExecutor`] that starts
/// `start_time` after the plan does.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: String,
    pub start_time: Duration,
    pub executor: RampingVuExecutor,
}

/// Several phases of one test, run concurrently against the same scenario.
///
/// Phases may overlap; their aggregates are merged into one result.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub phases: Vec<Phase>,
}

impl Plan {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// Time until the last phase finishes its stages.
    pub fn duration(&self) -> Duration {
        self.phases
            .iter()
            .map(|p| p.start_time + p.executor.duration())
            .max()
            .unwrap_or_default()
    }

    /// Upper bound of concurrently active virtual users.
    pub fn max_vus(&self) -> usize {
        self.phases.iter().map(|p| p.executor.max_vus()).sum()
    }
}

impl Plan {
    /// Runs every phase with its own scenario, built by `scenario_for` before
    /// any phase starts. Scenario names get the phase name appended.
    pub async fn exec_each<A, F, Fut, S>(&self, scenario_for: S) -> Result<A, Error>
    where
        A: Aggregate + 'static,
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = A::Metric> + Send + 'static,
        S: Fn(&Phase) -> Scenario<A, F, Fut>,
    {
        tracing::info!(
            "Plan has {} phases, {} in total",
            self.phases.len(),
            humantime::format_duration(self.duration())
        );

        let scenarios: Vec<Scenario<A, F, Fut>> = self
            .phases
            .iter()
            .map(|phase| {
                let scenario = scenario_for(phase);
                Scenario::<A, F, Fut>::builder()
                    .name(format!("{}/{}", scenario.name, phase.name))
                    .action(scenario.action)
                    .build()
            })
            .collect();

        let runs = self.phases.iter().zip(scenarios).map(|(phase, scenario)| async move {
            if !phase.start_time.is_zero() {
                tracing::debug!(
                    "Phase {} starts in {}",
                    phase.name,
                    humantime::format_duration(phase.start_time)
                );
                tokio::time::sleep(phase.start_time).await;
            }
            tracing::info!("Starting phase: {}", phase.name);
            phase.executor.exec(&scenario).await
        });

        let mut final_agg = A::new();
        for result in join_all(runs).await {
            final_agg.merge(result?);
        }
        Ok(final_agg)
    }
}

/// Every phase runs the same scenario action.
impl<A, F, Fut> Executor<A, F, Fut> for Plan
where
    A: Aggregate + 'static,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    type Error = Error;

    async fn exec(&self, scenario: &Scenario<A, F, Fut>) -> Result<A, Self::Error> {
        self.exec_each(|_| {
            Scenario::<A, F, Fut>::builder()
                .name(scenario.name.clone())
                .action(scenario.action.clone())
                .build()
        })
        .await
    }
}
