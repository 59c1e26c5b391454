//! One-time preparation before any virtual user starts: log in the three
//! accounts and load the catalog the flows draw from.
//!
//! Setup never fails. A login that does not work falls back to the admin
//! token, and a list that cannot be fetched is empty; the flows skip the
//! steps that need data they do not have.

use serde::de::DeserializeOwned;

use crate::{
    backend::{Backend, Endpoint, ProductQuery},
    catalog::{Catalog, parse_list},
    config::{Account, LoadConfig},
    domain::Credential,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub admin: Option<String>,
    pub cashier: Option<String>,
    pub inventory: Option<String>,
}

impl Tokens {
    pub fn token_for(&self, credential: Credential) -> Option<&str> {
        match credential {
            Credential::Admin => self.admin.as_deref(),
            Credential::Cashier => self.cashier.as_deref(),
            Credential::Inventory => self.inventory.as_deref(),
        }
    }
}

/// Everything the flows read during the run. Built once, then shared
/// read-only behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    pub tokens: Tokens,
    pub catalog: Catalog,
}

pub async fn setup<B: Backend>(backend: &B, config: &LoadConfig) -> RunContext {
    tracing::info!("Setting up load test against {}", config.base_url);
    let credentials = &config.credentials;

    let admin = login(backend, "admin", &credentials.admin).await;
    if admin.is_none() {
        tracing::error!("Admin login failed, requests will go out unauthenticated");
    }
    let cashier = match login(backend, "cashier", &credentials.cashier).await {
        Some(token) => Some(token),
        None => {
            tracing::warn!("Cashier login failed, using admin token");
            admin.clone()
        }
    };
    let inventory = match login(backend, "inventory", &credentials.inventory).await {
        Some(token) => Some(token),
        None => {
            tracing::warn!("Inventory login failed, using admin token");
            admin.clone()
        }
    };
    let tokens = Tokens {
        admin,
        cashier,
        inventory,
    };

    let token = tokens.admin.as_deref();
    let products = fetch_list(
        backend,
        token,
        "products",
        Endpoint::ListProducts(ProductQuery {
            per_page: Some(config.setup.products_per_page),
            ..Default::default()
        }),
    )
    .await;
    let customers = fetch_list(
        backend,
        token,
        "customers",
        Endpoint::ListCustomers {
            per_page: config.setup.customers_per_page,
        },
    )
    .await;
    let categories = fetch_list(backend, token, "categories", Endpoint::ListCategories).await;

    tracing::info!("Setup complete");
    RunContext {
        tokens,
        catalog: Catalog {
            products,
            customers,
            categories,
        },
    }
}

async fn login<B: Backend>(backend: &B, who: &str, account: &Account) -> Option<String> {
    let response = backend
        .send(
            None,
            Endpoint::Login {
                email: account.email.clone(),
                password: account.password.clone(),
            },
        )
        .await;
    if response.status != Some(200) {
        tracing::debug!(
            "{who} login returned {:?}: {}",
            response.status,
            response.excerpt()
        );
        return None;
    }
    let token = response
        .json()?
        .pointer("/data/access_token")?
        .as_str()
        .map(str::to_owned);
    if token.is_some() {
        tracing::info!("{who} login successful");
    }
    token
}

async fn fetch_list<B, T>(backend: &B, token: Option<&str>, what: &str, endpoint: Endpoint) -> Vec<T>
where
    B: Backend,
    T: DeserializeOwned,
{
    let response = backend.send(token, endpoint).await;
    if response.status != Some(200) {
        tracing::warn!(
            "Could not load {what} (status {:?}), continuing without them",
            response.status
        );
        return Vec::new();
    }
    let items = response
        .json()
        .map(|body| parse_list(&body))
        .unwrap_or_default();
    tracing::info!("Loaded {} {what}", items.len());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_resolve_to_their_tokens() {
        let tokens = Tokens {
            admin: Some("a".into()),
            cashier: Some("c".into()),
            inventory: None,
        };
        assert_eq!(tokens.token_for(Credential::Admin), Some("a"));
        assert_eq!(tokens.token_for(Credential::Cashier), Some("c"));
        assert_eq!(tokens.token_for(Credential::Inventory), None);
    }
}
