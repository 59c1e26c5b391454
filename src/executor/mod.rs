//! Executor: orchestration of virtual users over time
//!
//! The `Executor` trait is the runtime that executes a `Scenario`. The crate
//! ships [`RampingVuExecutor`], which keeps a linearly interpolated number of
//! virtual users looping over the scenario action, and [`Plan`], which runs
//! several of those as named, time-offset phases of one test.
pub mod plan;
pub mod vus;
pub use plan::{Phase, Plan};
pub use vus::{RampingVuExecutor, Stage};

use crate::{aggregate::Aggregate, scenario::Scenario};
use std::future::Future;

/// The runtime hook that executes a `Scenario`.
///
/// `Executor` defines the execution strategy for a given scenario: how many
/// concurrent iterations run, when they start and when the run is over.
pub trait Executor<A, F, Fut>
where
    Self: Send + Sync + Sized,
    A: Aggregate,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send,
{
    type Error;
    /// Execute the scenario and return the final aggregate.
    ///
    /// Implementations spawn the workers, drive them through the schedule and
    /// merge whatever the workers aggregated from `scenario.action`.
    fn exec(
        &self,
        scenario: &Scenario<A, F, Fut>,
    ) -> impl Future<Output = Result<A, Self::Error>> + Send;
}
