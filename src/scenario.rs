use std::{future::Future, marker::PhantomData};

use typed_builder::TypedBuilder;

use crate::aggregate::Aggregate;

/// A named action to be run repeatedly by an [`crate::Executor`].
///
/// The action is called once per iteration and must be cheap to clone: clone
/// shared state (clients, catalogs) into it rather than building it inside.
///
/// ```rust
/// use std::time::Duration;
/// use warung_load::{Scenario, aggregate::RunAggregate, domain::Role, metric::IterationMetric};
///
/// let scenario = Scenario::<RunAggregate, _, _>::builder()
///     .name("idle")
///     .action(|| async {
///         IterationMetric {
///             role: Role::Browser,
///             outcomes: vec![],
///             events: vec![],
///             duration: Duration::ZERO,
///         }
///     })
///     .build();
/// assert_eq!(scenario.name, "idle");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct Scenario<A, F, Fut>
where
    A: Aggregate,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send,
{
    #[builder(setter(into))]
    pub name: String,
    pub action: F,
    #[builder(default, setter(skip))]
    aggregate: PhantomData<A>,
}
