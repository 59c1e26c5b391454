mod common;

use std::{sync::Arc, time::Duration};

use common::{MockBackend, Request, reply};
use rand::{SeedableRng, rngs::StdRng};
use serde_json::json;
use warung_load::{
    Recorder, ScenarioRunner,
    backend::Endpoint,
    config::LoadConfig,
    domain::{Operation, PaymentMethod, Role},
    select::WeightTable,
    setup::setup,
};

async fn runner(backend: &MockBackend, config: &LoadConfig) -> ScenarioRunner<MockBackend> {
    let context = setup(backend, config).await;
    backend.clear();
    ScenarioRunner::new(Arc::new(backend.clone()), Arc::new(context), config)
}

fn checkout_every_time(mut config: LoadConfig) -> LoadConfig {
    config.traffic.cashier.checkout_probability = 1.0;
    config
}

fn kasbon_only(mut config: LoadConfig) -> LoadConfig {
    config.traffic.payment_weights = WeightTable::new([(PaymentMethod::Kasbon, 1.0)]).unwrap();
    config
}

fn transactions(requests: &[Request]) -> Vec<&Request> {
    requests
        .iter()
        .filter(|r| matches!(r.endpoint, Endpoint::CreateTransaction(_)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn kasbon_checkout_books_a_customer_and_pays_nothing() {
    let backend = MockBackend::healthy();
    let config = kasbon_only(checkout_every_time(LoadConfig::default()));
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(11);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    let requests = backend.requests();
    let checkouts = transactions(&requests);
    assert_eq!(checkouts.len(), 1);
    let Endpoint::CreateTransaction(payload) = &checkouts[0].endpoint else {
        unreachable!()
    };
    assert_eq!(payload.payment_method, PaymentMethod::Kasbon);
    assert_eq!(payload.amount_paid, 0);
    assert_eq!(payload.customer_id, Some(10_i64.into()));
    assert_eq!(checkouts[0].token.as_deref(), Some("tok-cashier@warung.com"));

    assert_eq!(
        rec.events(),
        ["kasbon_transactions".to_string(), "transactions_created".to_string()]
    );
    assert!(rec.outcomes().iter().all(|o| o.accepted));
}

#[tokio::test(start_paused = true)]
async fn cash_checkout_pays_at_least_the_calculated_total() {
    let backend = MockBackend::healthy();
    let mut config = checkout_every_time(LoadConfig::default());
    config.traffic.payment_weights = WeightTable::new([(PaymentMethod::Cash, 1.0)]).unwrap();
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(12);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    let requests = backend.requests();
    let checkouts = transactions(&requests);
    let Endpoint::CreateTransaction(payload) = &checkouts[0].endpoint else {
        unreachable!()
    };
    assert!((23_500..=33_500).contains(&payload.amount_paid));
    assert!(payload.customer_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn missing_total_falls_back_to_a_fixed_amount() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::CalculateCart { .. } => reply(200, json!({"data": {"items": []}})),
        _ => None,
    });
    let mut config = checkout_every_time(LoadConfig::default());
    config.traffic.payment_weights = WeightTable::new([(PaymentMethod::Qris, 1.0)]).unwrap();
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(13);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    let requests = backend.requests();
    let Endpoint::CreateTransaction(payload) = &transactions(&requests)[0].endpoint else {
        unreachable!()
    };
    assert_eq!(payload.amount_paid, 50_000);
}

#[tokio::test(start_paused = true)]
async fn rejected_calculation_skips_checkout_without_an_error() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::CalculateCart { .. } => reply(400, json!({"error": "insufficient stock"})),
        _ => None,
    });
    let config = checkout_every_time(LoadConfig::default());
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(14);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    assert!(transactions(&backend.requests()).is_empty());
    let calculate = rec
        .outcomes()
        .iter()
        .find(|o| o.operation == Operation::CartCalculate)
        .unwrap();
    assert!(calculate.accepted);
    assert!(rec.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreadable_calculation_is_an_error_and_skips_checkout() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::CalculateCart { .. } => Some((Some(200), "<html>gateway</html>".into())),
        _ => None,
    });
    let config = checkout_every_time(LoadConfig::default());
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(15);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    assert!(transactions(&backend.requests()).is_empty());
    let calculate = rec
        .outcomes()
        .iter()
        .find(|o| o.operation == Operation::CartCalculate)
        .unwrap();
    assert!(!calculate.accepted);
}

#[tokio::test(start_paused = true)]
async fn rejected_checkout_is_tolerated_but_not_created() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::CreateTransaction(_) => reply(400, json!({"error": "stock changed"})),
        _ => None,
    });
    let config = kasbon_only(checkout_every_time(LoadConfig::default()));
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(16);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    assert_eq!(rec.events(), ["kasbon_transactions".to_string()]);
    assert!(rec.outcomes().iter().all(|o| o.accepted));
}

#[tokio::test(start_paused = true)]
async fn cashier_with_a_tiny_catalog_never_builds_a_cart() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::ListProducts(q) if q.per_page == Some(200) => {
            reply(200, json!({"data": [{"id": 1}]}))
        }
        _ => None,
    });
    let config = checkout_every_time(LoadConfig::default());
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(17);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Cashier, &mut rec, &mut rng).await;

    assert!(
        backend
            .requests()
            .iter()
            .all(|r| matches!(r.endpoint, Endpoint::ListProducts(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn browser_accepts_missing_product_details() {
    let backend = MockBackend::healthy();
    let mut config = LoadConfig::default();
    let browser = &mut config.traffic.browser;
    browser.category_probability = 1.0;
    browser.search_probability = 1.0;
    browser.detail_probability = 1.0;
    browser.pagination_probability = 1.0;
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(21);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Browser, &mut rec, &mut rng).await;

    let operations: Vec<Operation> = rec.outcomes().iter().map(|o| o.operation).collect();
    assert_eq!(
        operations,
        vec![
            Operation::ProductList,
            Operation::CategoryFilter,
            Operation::ProductSearch,
            Operation::ProductDetail,
            Operation::Pagination,
        ]
    );
    let detail = &rec.outcomes()[3];
    assert_eq!(detail.status, Some(404));
    assert!(detail.accepted);
    assert!(detail.is_failed_request());
}

#[tokio::test(start_paused = true)]
async fn manager_keeps_going_after_a_failed_dashboard() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::Dashboard => reply(500, json!({"error": "boom"})),
        _ => None,
    });
    let mut config = LoadConfig::default();
    let manager = &mut config.traffic.manager;
    manager.daily_report_probability = 1.0;
    manager.kasbon_report_probability = 1.0;
    manager.customers_with_debt_probability = 1.0;
    manager.customer_kasbon_probability = 1.0;
    manager.transaction_list_probability = 1.0;
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(31);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Manager, &mut rec, &mut rng).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 6);
    assert!(
        requests
            .iter()
            .all(|r| r.token.as_deref() == Some("tok-admin@warung.com"))
    );
    assert!(matches!(
        &requests[1].endpoint,
        Endpoint::DailyReport { date } if date.len() == 10
    ));
    assert!(matches!(
        &requests[4].endpoint,
        Endpoint::KasbonSummary { customer_id } if *customer_id == 10_i64.into()
    ));
    let failed: Vec<Operation> = rec
        .outcomes()
        .iter()
        .filter(|o| !o.accepted)
        .map(|o| o.operation)
        .collect();
    assert_eq!(failed, vec![Operation::Dashboard]);
}

#[tokio::test(start_paused = true)]
async fn inventory_uses_its_own_token() {
    let backend = MockBackend::healthy();
    let mut config = LoadConfig::default();
    config.traffic.inventory.detail_probability = 1.0;
    config.traffic.inventory.restock_probability = 1.0;
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(41);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Inventory, &mut rec, &mut rng).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].endpoint, Endpoint::LowStock);
    assert!(
        requests
            .iter()
            .all(|r| r.token.as_deref() == Some("tok-inventory@warung.com"))
    );
    let Endpoint::ListProducts(restock) = &requests[3].endpoint else {
        unreachable!()
    };
    let term = restock.search.clone().unwrap();
    assert!(config.traffic.inventory.restock_terms.contains(&term));
}

#[tokio::test(start_paused = true)]
async fn iteration_includes_think_time() {
    let backend = MockBackend::healthy();
    let mut config = LoadConfig::default();
    config.traffic.role_weights = WeightTable::new([(Role::Inventory, 1.0)]).unwrap();
    config.traffic.think_time_secs.min = 2;
    config.traffic.think_time_secs.max = 2;
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(51);

    let metric = runner.iterate(&mut rng).await;

    assert_eq!(metric.role, Role::Inventory);
    // low stock pause plus think time
    assert!(metric.duration >= Duration::from_millis(2_300));
    assert!(metric.duration < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn reader_counts_every_accepted_query() {
    let backend = MockBackend::healthy();
    let config = LoadConfig::default();
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(61);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Reader, &mut rec, &mut rng).await;

    let operations: Vec<Operation> = rec.outcomes().iter().map(|o| o.operation).collect();
    assert_eq!(
        operations,
        vec![
            Operation::ProductList,
            Operation::ProductSearch,
            Operation::ProductDetail,
            Operation::Dashboard,
        ]
    );
    // the missing product detail is a tolerated 404
    assert_eq!(rec.events(), vec!["read_success".to_string(); 4]);

    let requests = backend.requests();
    assert!(
        requests
            .iter()
            .all(|r| r.token.as_deref() == Some("tok-admin@warung.com"))
    );
    let Endpoint::ListProducts(list) = &requests[0].endpoint else {
        unreachable!()
    };
    assert!((1..=50).contains(&list.page.unwrap()));
    assert_eq!(list.per_page, Some(20));
    let Endpoint::ListProducts(search) = &requests[1].endpoint else {
        unreachable!()
    };
    let term = search.search.clone().unwrap();
    assert!(config.traffic.stress.search_terms.contains(&term));
}

#[tokio::test(start_paused = true)]
async fn writer_prices_a_cart_and_inserts_a_customer() {
    let backend = MockBackend::healthy();
    let config = LoadConfig::default();
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(62);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Writer, &mut rec, &mut rng).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let Endpoint::CalculateCart { items } = &requests[0].endpoint else {
        unreachable!()
    };
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| (1..=5).contains(&i.quantity)));
    assert!(matches!(
        &requests[1].endpoint,
        Endpoint::CreateCustomer { phone, .. } if phone.starts_with("08") && phone.len() == 12
    ));
    assert_eq!(rec.events(), vec!["write_success".to_string(); 2]);
}

#[tokio::test(start_paused = true)]
async fn writer_treats_rejected_pricing_as_an_error_and_conflicts_as_handled() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::CalculateCart { .. } => reply(400, json!({"error": "insufficient stock"})),
        Endpoint::CreateCustomer { .. } => reply(409, json!({"error": "phone already registered"})),
        _ => None,
    });
    let config = LoadConfig::default();
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(63);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Writer, &mut rec, &mut rng).await;

    let accepted: Vec<(Operation, bool)> = rec
        .outcomes()
        .iter()
        .map(|o| (o.operation, o.accepted))
        .collect();
    assert_eq!(
        accepted,
        vec![(Operation::CartCalculate, false), (Operation::CustomerCreate, true)]
    );
    assert_eq!(rec.events(), ["write_success".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn writer_skips_pricing_with_a_tiny_catalog() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::ListProducts(q) if q.per_page == Some(200) => {
            reply(200, json!({"data": [{"id": 1}, {"id": 2}]}))
        }
        _ => None,
    });
    let config = LoadConfig::default();
    let runner = runner(&backend, &config).await;
    let mut rng = StdRng::seed_from_u64(64);

    let mut rec = Recorder::new(runner.policies());
    runner.run_role(Role::Writer, &mut rec, &mut rng).await;

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert!(matches!(requests[0].endpoint, Endpoint::CreateCustomer { .. }));
}

#[tokio::test(start_paused = true)]
async fn phase_role_mix_overrides_the_traffic_mix() {
    let backend = MockBackend::healthy();
    let config = LoadConfig::default();
    let runner = runner(&backend, &config).await;
    let writers = runner.with_roles(&WeightTable::new([(Role::Writer, 1.0)]).unwrap());
    let mut rng = StdRng::seed_from_u64(65);

    for _ in 0..5 {
        assert_eq!(writers.iterate(&mut rng).await.role, Role::Writer);
    }
    assert!(
        backend
            .requests()
            .iter()
            .all(|r| matches!(r.endpoint, Endpoint::CalculateCart { .. } | Endpoint::CreateCustomer { .. }))
    );
}
