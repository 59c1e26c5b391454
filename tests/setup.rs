mod common;

use common::{MockBackend, reply};
use serde_json::json;
use warung_load::{
    backend::Endpoint,
    catalog::EntityId,
    config::LoadConfig,
    domain::Credential,
    setup::setup,
};

#[tokio::test]
async fn logs_in_every_account_and_loads_the_catalog() {
    let backend = MockBackend::healthy();
    let ctx = setup(&backend, &LoadConfig::default()).await;

    assert_eq!(ctx.tokens.admin.as_deref(), Some("tok-admin@warung.com"));
    assert_eq!(ctx.tokens.cashier.as_deref(), Some("tok-cashier@warung.com"));
    assert_eq!(ctx.tokens.inventory.as_deref(), Some("tok-inventory@warung.com"));
    assert_eq!(ctx.catalog.products.len(), 3);
    assert_eq!(ctx.catalog.customers[0].id, EntityId::from(10_i64));
    assert_eq!(ctx.catalog.categories.len(), 1);

    let requests = backend.requests();
    let products = requests
        .iter()
        .find(|r| matches!(r.endpoint, Endpoint::ListProducts(_)))
        .unwrap();
    assert_eq!(products.token.as_deref(), Some("tok-admin@warung.com"));
    assert_eq!(products.endpoint.query(), vec![("per_page", "200".to_string())]);
}

#[tokio::test]
async fn failed_logins_fall_back_to_the_admin_token() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::Login { email, .. } if email != "admin@warung.com" => {
            reply(401, json!({"error": "invalid credentials"}))
        }
        _ => None,
    });
    let ctx = setup(&backend, &LoadConfig::default()).await;

    assert_eq!(ctx.tokens.token_for(Credential::Cashier), Some("tok-admin@warung.com"));
    assert_eq!(ctx.tokens.token_for(Credential::Inventory), Some("tok-admin@warung.com"));
}

#[tokio::test]
async fn without_admin_everything_goes_out_unauthenticated() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::Login { .. } => reply(500, json!({})),
        _ => None,
    });
    let ctx = setup(&backend, &LoadConfig::default()).await;

    assert_eq!(ctx.tokens.admin, None);
    assert_eq!(ctx.tokens.cashier, None);
    assert_eq!(ctx.tokens.inventory, None);
    let lists: Vec<_> = backend
        .requests()
        .into_iter()
        .filter(|r| !r.endpoint.is_auth())
        .collect();
    assert_eq!(lists.len(), 3);
    assert!(lists.iter().all(|r| r.token.is_none()));
}

#[tokio::test]
async fn login_without_a_token_counts_as_failed() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::Login { email, .. } if email == "cashier@warung.com" => {
            reply(200, json!({"data": {}}))
        }
        _ => None,
    });
    let ctx = setup(&backend, &LoadConfig::default()).await;
    assert_eq!(ctx.tokens.cashier.as_deref(), Some("tok-admin@warung.com"));
}

#[tokio::test]
async fn failed_lists_are_empty() {
    let backend = MockBackend::with(|endpoint| match endpoint {
        Endpoint::ListProducts(_) => reply(503, json!({"error": "maintenance"})),
        Endpoint::ListCategories => Some((Some(200), "not json".to_string())),
        Endpoint::ListCustomers { .. } => Some((None, "connection refused".to_string())),
        _ => None,
    });
    let ctx = setup(&backend, &LoadConfig::default()).await;

    assert!(ctx.catalog.products.is_empty());
    assert!(ctx.catalog.customers.is_empty());
    assert!(ctx.catalog.categories.is_empty());
    assert!(ctx.tokens.admin.is_some());
}
