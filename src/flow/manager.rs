//! The owner checking on the shop: dashboard, reports and outstanding credit.

use rand::{Rng, seq::SliceRandom};

use super::{FlowContext, chance, pause};
use crate::{
    backend::{Backend, Endpoint},
    domain::Operation,
    recorder::Recorder,
};

pub async fn run<B, R>(ctx: &FlowContext<'_, B>, rec: &mut Recorder<'_>, rng: &mut R)
where
    B: Backend,
    R: Rng + Send,
{
    let cfg = &ctx.traffic.manager;

    let dashboard = ctx.send(Endpoint::Dashboard).await;
    rec.check(Operation::Dashboard, &dashboard);
    pause(cfg.pause_after_dashboard).await;

    if chance(rng, cfg.daily_report_probability) {
        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let response = ctx.send(Endpoint::DailyReport { date }).await;
        rec.check(Operation::DailyReport, &response);
        pause(cfg.pause_after_daily_report).await;
    }

    if chance(rng, cfg.kasbon_report_probability) {
        let response = ctx.send(Endpoint::KasbonReport).await;
        rec.check(Operation::KasbonReport, &response);
        pause(cfg.pause_after_kasbon_report).await;
    }

    if chance(rng, cfg.customers_with_debt_probability) {
        let response = ctx.send(Endpoint::CustomersWithDebt).await;
        rec.check(Operation::CustomersWithDebt, &response);
    }

    let customers = &ctx.catalog.customers;
    if !customers.is_empty() && chance(rng, cfg.customer_kasbon_probability) {
        if let Some(customer) = customers.choose(rng) {
            let response = ctx
                .send(Endpoint::KasbonSummary {
                    customer_id: customer.id.clone(),
                })
                .await;
            rec.check(Operation::CustomerKasbon, &response);
        }
    }

    if chance(rng, cfg.transaction_list_probability) {
        let response = ctx
            .send(Endpoint::ListTransactions {
                per_page: cfg.transactions_per_page,
            })
            .await;
        rec.check(Operation::TransactionList, &response);
    }
}
