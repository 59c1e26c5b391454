use std::{collections::BTreeMap, sync::Arc, time::Duration};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::time::Instant;

use crate::{
    backend::Backend,
    catalog::EntityId,
    config::{LoadConfig, TrafficConfig},
    domain::{Operation, OperationPolicy, Role},
    flow::{self, FlowContext},
    metric::IterationMetric,
    recorder::Recorder,
    select::WeightTable,
    setup::RunContext,
};

/// Runs one virtual-user iteration at a time: pick a role, play its flow,
/// think, and report what happened.
///
/// Cloning is cheap and every clone shares the backend, the run context and
/// the configuration, so one runner can be moved into the scenario action and
/// cloned per iteration.
pub struct ScenarioRunner<B> {
    backend: Arc<B>,
    context: Arc<RunContext>,
    traffic: Arc<TrafficConfig>,
    roles: Arc<WeightTable<Role>>,
    policies: Arc<BTreeMap<Operation, OperationPolicy>>,
    product_ids: Arc<[EntityId]>,
}

impl<B> Clone for ScenarioRunner<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            context: Arc::clone(&self.context),
            traffic: Arc::clone(&self.traffic),
            roles: Arc::clone(&self.roles),
            policies: Arc::clone(&self.policies),
            product_ids: Arc::clone(&self.product_ids),
        }
    }
}

impl<B: Backend> ScenarioRunner<B> {
    pub fn new(backend: Arc<B>, context: Arc<RunContext>, config: &LoadConfig) -> Self {
        let product_ids = context.catalog.product_ids().into();
        Self {
            backend,
            context,
            traffic: Arc::new(config.traffic.clone()),
            roles: Arc::new(config.traffic.role_weights.clone()),
            policies: Arc::new(config.policies()),
            product_ids,
        }
    }

    /// A runner sharing everything with this one but drawing roles from
    /// `roles`, for phases with their own role mix.
    pub fn with_roles(&self, roles: &WeightTable<Role>) -> Self {
        Self {
            roles: Arc::new(roles.clone()),
            ..self.clone()
        }
    }

    /// One iteration with a fresh entropy-seeded generator. This is the
    /// scenario action.
    pub async fn next_iteration(self) -> IterationMetric {
        let mut rng = StdRng::from_entropy();
        self.iterate(&mut rng).await
    }

    /// One full iteration including think time.
    pub async fn iterate<R: Rng + Send>(&self, rng: &mut R) -> IterationMetric {
        let start = Instant::now();
        let role = *self.roles.select(rng);
        let mut rec = Recorder::new(&self.policies);

        self.run_role(role, &mut rec, rng).await;

        let think = rng.gen_range(self.traffic.think_time_secs.range());
        tokio::time::sleep(Duration::from_secs(think.into())).await;
        rec.finish(role, start.elapsed())
    }

    /// Plays the flow of `role` into `rec`, without think time.
    pub async fn run_role<R: Rng + Send>(&self, role: Role, rec: &mut Recorder<'_>, rng: &mut R) {
        let ctx = FlowContext {
            backend: self.backend.as_ref(),
            token: self.context.tokens.token_for(role.credential()),
            catalog: &self.context.catalog,
            product_ids: &self.product_ids,
            traffic: &self.traffic,
        };
        tracing::trace!("Running {role} flow");
        flow::run(role, &ctx, rec, rng).await;
    }

    pub fn policies(&self) -> &BTreeMap<Operation, OperationPolicy> {
        &self.policies
    }
}
