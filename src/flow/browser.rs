//! A customer browsing the catalog on the shop's app or asking at the
//! counter. Read-only.

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
    let cfg = &ctx.traffic.browser;

    let list = ctx
        .send(Endpoint::ListProducts(ProductQuery {
            per_page: Some(cfg.per_page),
            ..Default::default()
        }))
        .await;
    rec.check(Operation::ProductList, &list);
    pause(cfg.pause_after_list).await;

    if !ctx.catalog.categories.is_empty() && chance(rng, cfg.category_probability) {
        if let Some(category) = ctx.catalog.categories.choose(rng) {
            let response = ctx
                .send(Endpoint::ListProducts(ProductQuery {
                    category_id: Some(category.id.clone()),
                    ..Default::default()
                }))
                .await;
            rec.check(Operation::CategoryFilter, &response);
            pause(cfg.pause_after_category).await;
        }
    }

    if chance(rng, cfg.search_probability) {
        if let Some(search) = ctx.search(&ctx.traffic.search_terms, rng) {
            let response = ctx.send(search).await;
            rec.check(Operation::ProductSearch, &response);
            pause(cfg.pause_after_search).await;
        }
    }

    if !ctx.product_ids.is_empty() && chance(rng, cfg.detail_probability) {
        if let Some(id) = ctx.product_ids.choose(rng) {
            let response = ctx.send(Endpoint::ProductDetail { id: id.clone() }).await;
            rec.check(Operation::ProductDetail, &response);
        }
    }

    if chance(rng, cfg.pagination_probability) {
        let page = rng.gen_range(cfg.pagination_pages.range());
        let response = ctx
            .send(Endpoint::ListProducts(ProductQuery {
                page: Some(page),
                per_page: Some(cfg.per_page),
                ..Default::default()
            }))
            .await;
        rec.check(Operation::Pagination, &response);
    }
}
