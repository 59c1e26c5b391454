//! Database stress: readers paging, searching and aggregating; writers
//! pricing carts and inserting customers. Every accepted request bumps
//! `read_success` or `write_success`.

use rand::{Rng, seq::SliceRandom};

use super::{FlowContext, pause};
use crate::{
    backend::{Backend, Endpoint, ProductQuery},
    cart::CartItem,
    domain::Operation,
    recorder::Recorder,
    threshold::{READ_SUCCESS, WRITE_SUCCESS},
};

pub async fn reads<B, R>(ctx: &FlowContext<'_, B>, rec: &mut Recorder<'_>, rng: &mut R)
where
    B: Backend,
    R: Rng + Send,
{
    let cfg = &ctx.traffic.stress;

    let page = rng.gen_range(cfg.pages.range());
    let list = ctx
        .send(Endpoint::ListProducts(ProductQuery {
            page: Some(page),
            per_page: Some(cfg.per_page),
            ..Default::default()
        }))
        .await;
    if rec.check(Operation::ProductList, &list) {
        rec.count(READ_SUCCESS);
    }
    pause(cfg.pause_after_list).await;

    if let Some(search) = ctx.search(&cfg.search_terms, rng) {
        let response = ctx.send(search).await;
        if rec.check(Operation::ProductSearch, &response) {
            rec.count(READ_SUCCESS);
        }
    }
    pause(cfg.pause_after_search).await;

    if let Some(id) = ctx.product_ids.choose(rng) {
        let response = ctx.send(Endpoint::ProductDetail { id: id.clone() }).await;
        if rec.check(Operation::ProductDetail, &response) {
            rec.count(READ_SUCCESS);
        }
    }
    pause(cfg.pause_after_detail).await;

    let dashboard = ctx.send(Endpoint::Dashboard).await;
    if rec.check(Operation::Dashboard, &dashboard) {
        rec.count(READ_SUCCESS);
    }
    pause(cfg.pause_after_dashboard).await;
}

pub async fn writes<B, R>(ctx: &FlowContext<'_, B>, rec: &mut Recorder<'_>, rng: &mut R)
where
    B: Backend,
    R: Rng + Send,
{
    let cfg = &ctx.traffic.stress;

    if cfg.cart_items > 0 && ctx.product_ids.len() >= cfg.cart_items as usize {
        let items = (0..cfg.cart_items)
            .filter_map(|_| {
                let product_id = ctx.product_ids.choose(rng)?.clone();
                let quantity = rng.gen_range(cfg.quantity.range());
                Some(CartItem {
                    product_id,
                    quantity,
                })
            })
            .collect();
        let response = ctx.send(Endpoint::CalculateCart { items }).await;
        // pricing must succeed here; stock rejections count as errors
        if rec.record(
            Operation::CartCalculate,
            response.status,
            200,
            &[],
            response.latency,
        ) {
            rec.count(WRITE_SUCCESS);
        }
    }
    pause(cfg.pause_after_calculate).await;

    let response = ctx.send(new_customer(rng)).await;
    if rec.check(Operation::CustomerCreate, &response) {
        rec.count(WRITE_SUCCESS);
    }
    pause(cfg.pause_after_customer).await;
}

/// A customer with a timestamped name and a random `08` mobile number.
pub fn new_customer<R: Rng>(rng: &mut R) -> Endpoint {
    let millis = chrono::Utc::now().timestamp_millis();
    let subscriber: u64 = rng.gen_range(1_000_000_000..=9_999_999_999);
    Endpoint::CreateCustomer {
        name: format!("Stress Test Customer {millis}"),
        phone: format!("08{subscriber}"),
    }
}
