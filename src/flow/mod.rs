//! Role flows: the probabilistic step sequence each synthetic user type runs
//! in one iteration.
//!
//! Every step is independent. An unacceptable response is recorded and the
//! flow moves on; only a step that needs data another step failed to produce
//! (checkout without a calculated cart) is skipped.
pub mod browser;
pub mod cashier;
pub mod inventory;
pub mod manager;
pub mod stress;

use std::time::Duration;

use rand::{Rng, seq::SliceRandom};

use crate::{
    backend::{ApiResponse, Backend, Endpoint, ProductQuery},
    catalog::{Catalog, EntityId},
    config::TrafficConfig,
    domain::Role,
    recorder::Recorder,
};

/// What a flow may read during one iteration.
pub struct FlowContext<'a, B> {
    pub backend: &'a B,
    /// Bearer token of the role, `None` when setup could not log in.
    pub token: Option<&'a str>,
    pub catalog: &'a Catalog,
    /// Ids of `catalog.products`, in the same order.
    pub product_ids: &'a [EntityId],
    pub traffic: &'a TrafficConfig,
}

impl<B: Backend> FlowContext<'_, B> {
    pub async fn send(&self, endpoint: Endpoint) -> ApiResponse {
        self.backend.send(self.token, endpoint).await
    }

    fn search<R: Rng>(&self, terms: &[String], rng: &mut R) -> Option<Endpoint> {
        let term = terms.choose(rng)?;
        Some(Endpoint::ListProducts(ProductQuery {
            search: Some(term.clone()),
            ..Default::default()
        }))
    }
}

/// Runs the flow of `role`.
pub async fn run<B, R>(role: Role, ctx: &FlowContext<'_, B>, rec: &mut Recorder<'_>, rng: &mut R)
where
    B: Backend,
    R: Rng + Send,
{
    match role {
        Role::Cashier => cashier::run(ctx, rec, rng).await,
        Role::Browser => browser::run(ctx, rec, rng).await,
        Role::Manager => manager::run(ctx, rec, rng).await,
        Role::Inventory => inventory::run(ctx, rec, rng).await,
        Role::Reader => stress::reads(ctx, rec, rng).await,
        Role::Writer => stress::writes(ctx, rec, rng).await,
    }
}

pub(crate) fn chance<R: Rng>(rng: &mut R, probability: f64) -> bool {
    rng.gen_bool(probability.clamp(0.0, 1.0))
}

pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
