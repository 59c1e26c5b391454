//! The cashier ringing up a sale: look up products, build a cart, have the
//! backend price it and usually check out.

use rand::{Rng, seq::SliceRandom};
use serde_json::Value;

use super::{FlowContext, chance, pause};
use crate::{
    backend::{Backend, Endpoint, ProductQuery, TransactionPayload},
    cart::{CartItem, build_cart},
    catalog::Customer,
    config::CashierConfig,
    domain::{Operation, PaymentMethod},
    recorder::Recorder,
    threshold::TRANSACTIONS_CREATED,
};

pub async fn run<B, R>(ctx: &FlowContext<'_, B>, rec: &mut Recorder<'_>, rng: &mut R)
where
    B: Backend,
    R: Rng + Send,
{
    let cfg = &ctx.traffic.cashier;

    let page = rng.gen_range(cfg.pages.range());
    let list = ctx
        .send(Endpoint::ListProducts(ProductQuery {
            page: Some(page),
            per_page: Some(cfg.per_page),
            ..Default::default()
        }))
        .await;
    rec.check(Operation::ProductList, &list);
    pause(cfg.pause_after_list).await;

    if chance(rng, cfg.search_probability) {
        if let Some(search) = ctx.search(&ctx.traffic.search_terms, rng) {
            let response = ctx.send(search).await;
            rec.check(Operation::ProductSearch, &response);
            pause(cfg.pause_after_search).await;
        }
    }

    if ctx.product_ids.len() < cfg.min_products {
        return;
    }
    let count = rng.gen_range(cfg.items.range()) as usize;
    let items = build_cart(ctx.product_ids, count, cfg.quantity.range(), rng);
    let calculation = ctx
        .send(Endpoint::CalculateCart {
            items: items.clone(),
        })
        .await;
    let priced = rec.check_json(Operation::CartCalculate, &calculation, Value::is_object);
    pause(cfg.pause_after_calculate).await;

    if !chance(rng, cfg.checkout_probability) {
        return;
    }
    // a rejected or unreadable calculation leaves nothing to pay for
    let Some(priced) = priced else {
        return;
    };

    let total = cart_total(&priced).unwrap_or(cfg.fallback_total);
    let method = *ctx.traffic.payment_weights.select(rng);
    let payload = checkout_payload(cfg, method, items, total, &ctx.catalog.customers, rng);
    rec.count(method.counter());

    let response = ctx.send(Endpoint::CreateTransaction(payload)).await;
    if rec.check(Operation::Checkout, &response) && response.status == Some(201) {
        rec.count(TRANSACTIONS_CREATED);
    }
}

/// `data.total_amount` of a calculation response, in whole rupiah. Zero
/// counts as missing.
pub fn cart_total(body: &Value) -> Option<i64> {
    body.pointer("/data/total_amount")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .filter(|total| *total != 0)
}

/// Builds the transaction body for a checkout paid with `method`.
///
/// Cash overpays by a random amount, transfer and QRIS pay exactly. Kasbon is
/// booked against a random customer and pays nothing now; with no customers
/// loaded it goes out without one and the backend decides.
pub fn checkout_payload<R: Rng>(
    cfg: &CashierConfig,
    method: PaymentMethod,
    items: Vec<CartItem>,
    total: i64,
    customers: &[Customer],
    rng: &mut R,
) -> TransactionPayload {
    let cashier_name = format!("Kasir {}", rng.gen_range(cfg.cashier_numbers.range()));
    let (amount_paid, customer_id) = match method {
        PaymentMethod::Cash => (total + i64::from(rng.gen_range(cfg.cash_overpay.range())), None),
        PaymentMethod::Transfer | PaymentMethod::Qris => (total, None),
        PaymentMethod::Kasbon => (0, customers.choose(rng).map(|c| c.id.clone())),
    };
    TransactionPayload {
        items,
        payment_method: method,
        amount_paid,
        cashier_name,
        customer_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityId;
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::json;

    fn items() -> Vec<CartItem> {
        vec![CartItem {
            product_id: EntityId::from(3_i64),
            quantity: 2,
        }]
    }

    fn customer(id: i64) -> Customer {
        Customer {
            id: EntityId::from(id),
            name: None,
            credit_limit: None,
            current_debt: None,
        }
    }

    #[test]
    fn total_falls_back_when_missing_or_zero() {
        assert_eq!(cart_total(&json!({"data": {"total_amount": 12500}})), Some(12500));
        assert_eq!(cart_total(&json!({"data": {"total_amount": 0}})), None);
        assert_eq!(cart_total(&json!({"data": {}})), None);
        assert_eq!(cart_total(&json!({"total_amount": 5})), None);
        assert_eq!(cart_total(&json!({"data": {"total_amount": 12500.0}})), Some(12500));
    }

    #[test]
    fn amounts_go_out_as_json_integers() {
        let cfg = CashierConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let payload =
            checkout_payload(&cfg, PaymentMethod::Transfer, items(), 25_000, &[], &mut rng);
        let body = crate::backend::Endpoint::CreateTransaction(payload)
            .body()
            .unwrap()
            .to_string();
        assert!(body.contains(r#""amount_paid":25000,"#), "{body}");

        let payload = checkout_payload(&cfg, PaymentMethod::Cash, items(), 25_000, &[], &mut rng);
        let body = crate::backend::Endpoint::CreateTransaction(payload).body().unwrap();
        assert!(body["amount_paid"].is_i64());
    }

    #[test]
    fn cash_overpays_within_range() {
        let cfg = CashierConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let payload =
                checkout_payload(&cfg, PaymentMethod::Cash, items(), 25_000, &[], &mut rng);
            assert!((25_000..=35_000).contains(&payload.amount_paid));
            assert!(payload.customer_id.is_none());
            assert!(["Kasir 1", "Kasir 2", "Kasir 3"].contains(&payload.cashier_name.as_str()));
        }
    }

    #[test]
    fn non_cash_pays_exactly() {
        let cfg = CashierConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        for method in [PaymentMethod::Transfer, PaymentMethod::Qris] {
            let payload = checkout_payload(&cfg, method, items(), 18_000, &[], &mut rng);
            assert_eq!(payload.amount_paid, 18_000);
            assert_eq!(payload.payment_method, method);
        }
    }

    #[test]
    fn kasbon_is_booked_on_a_customer() {
        let cfg = CashierConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let customers = [customer(7), customer(8)];
        let payload = checkout_payload(
            &cfg,
            PaymentMethod::Kasbon,
            items(),
            40_000,
            &customers,
            &mut rng,
        );
        assert_eq!(payload.amount_paid, 0);
        let id = payload.customer_id.unwrap();
        assert!(customers.iter().any(|c| c.id == id));
    }

    #[test]
    fn kasbon_without_customers_has_no_customer() {
        let cfg = CashierConfig::default();
        let mut rng = StdRng::seed_from_u64(6);
        let payload =
            checkout_payload(&cfg, PaymentMethod::Kasbon, items(), 40_000, &[], &mut rng);
        assert_eq!(payload.amount_paid, 0);
        assert!(payload.customer_id.is_none());
    }
}
