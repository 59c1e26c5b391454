//! Stock keeping: what is running low, what is on the shelf, what to reorder.

use rand::{Rng, seq::SliceRandom};

use super::{FlowContext, chance, pause};
use crate::{
    backend::{Backend, Endpoint, ProductQuery},
    domain::Operation,
    recorder::Recorder,
};

pub async fn run<B, R>(ctx: &FlowContext<'_, B>, rec: &mut Recorder<'_>, rng: &mut R)
where
    B: Backend,
    R: Rng + Send,
{
    let cfg = &ctx.traffic.inventory;

    let low_stock = ctx.send(Endpoint::LowStock).await;
    rec.check(Operation::LowStock, &low_stock);
    pause(cfg.pause_after_low_stock).await;

    let list = ctx
        .send(Endpoint::ListProducts(ProductQuery {
            per_page: Some(cfg.per_page),
            ..Default::default()
        }))
        .await;
    rec.check(Operation::ProductList, &list);

    if !ctx.product_ids.is_empty() && chance(rng, cfg.detail_probability) {
        if let Some(id) = ctx.product_ids.choose(rng) {
            let response = ctx.send(Endpoint::ProductDetail { id: id.clone() }).await;
            rec.check(Operation::ProductDetail, &response);
        }
    }

    if chance(rng, cfg.restock_probability) {
        if let Some(search) = ctx.search(&cfg.restock_terms, rng) {
            let response = ctx.send(search).await;
            rec.check(Operation::ProductSearch, &response);
        }
    }
}
