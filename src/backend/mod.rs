//! The system under test, seen from the traffic generator.
//!
//! [`Endpoint`] enumerates every request the flows issue and [`Backend`] is
//! the seam that sends them. The production implementation is
//! [`HttpBackend`]; tests plug in an in-memory backend instead.
pub mod http;
pub use http::HttpBackend;

use std::{future::Future, time::Duration};

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{cart::CartItem, catalog::EntityId, domain::PaymentMethod};

/// Body of `POST /transactions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPayload {
    pub items: Vec<CartItem>,
    pub payment_method: PaymentMethod,
    /// Whole rupiah; the API rejects fractional amounts.
    pub amount_paid: i64,
    pub cashier_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<EntityId>,
}

/// Query of `GET /products`; unset fields are left out of the URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub category_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Login { email: String, password: String },
    ListProducts(ProductQuery),
    ProductDetail { id: EntityId },
    LowStock,
    CalculateCart { items: Vec<CartItem> },
    CreateTransaction(TransactionPayload),
    ListCustomers { per_page: u32 },
    CustomersWithDebt,
    KasbonSummary { customer_id: EntityId },
    Dashboard,
    /// `date` is formatted `YYYY-MM-DD`.
    DailyReport { date: String },
    KasbonReport,
    ListCategories,
    ListTransactions { per_page: u32 },
    CreateCustomer { name: String, phone: String },
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Login { .. }
            | Endpoint::CalculateCart { .. }
            | Endpoint::CreateTransaction(_)
            | Endpoint::CreateCustomer { .. } => Method::POST,
            _ => Method::GET,
        }
    }

    /// Login lives next to the API rather than under its version prefix.
    pub fn is_auth(&self) -> bool {
        matches!(self, Endpoint::Login { .. })
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Login { .. } => "/auth/login".into(),
            Endpoint::ListProducts(_) => "/products".into(),
            Endpoint::ProductDetail { id } => format!("/products/{id}"),
            Endpoint::LowStock => "/products/low-stock".into(),
            Endpoint::CalculateCart { .. } => "/transactions/calculate".into(),
            Endpoint::CreateTransaction(_) => "/transactions".into(),
            Endpoint::ListCustomers { .. } | Endpoint::CreateCustomer { .. } => "/customers".into(),
            Endpoint::CustomersWithDebt => "/customers/with-debt".into(),
            Endpoint::KasbonSummary { customer_id } => {
                format!("/kasbon/customers/{customer_id}/summary")
            }
            Endpoint::Dashboard => "/reports/dashboard".into(),
            Endpoint::DailyReport { .. } => "/reports/daily".into(),
            Endpoint::KasbonReport => "/reports/kasbon".into(),
            Endpoint::ListCategories => "/categories".into(),
            Endpoint::ListTransactions { .. } => "/transactions".into(),
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::ListProducts(q) => {
                let mut pairs = Vec::new();
                if let Some(page) = q.page {
                    pairs.push(("page", page.to_string()));
                }
                if let Some(per_page) = q.per_page {
                    pairs.push(("per_page", per_page.to_string()));
                }
                if let Some(search) = &q.search {
                    pairs.push(("search", search.clone()));
                }
                if let Some(category) = &q.category_id {
                    pairs.push(("category_id", category.to_string()));
                }
                pairs
            }
            Endpoint::ListCustomers { per_page } | Endpoint::ListTransactions { per_page } => {
                vec![("per_page", per_page.to_string())]
            }
            Endpoint::DailyReport { date } => vec![("date", date.clone())],
            _ => Vec::new(),
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            Endpoint::Login { email, password } => {
                Some(json!({ "email": email, "password": password }))
            }
            Endpoint::CalculateCart { items } => Some(json!({ "items": items })),
            Endpoint::CreateTransaction(payload) => serde_json::to_value(payload).ok(),
            Endpoint::CreateCustomer { name, phone } => Some(json!({ "name": name, "phone": phone })),
            _ => None,
        }
    }
}

/// What came back for one request. `status` is `None` when the request never
/// produced an HTTP response (connect error, timeout, broken body).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: Option<u16>,
    pub body: String,
    pub latency: Duration,
}

impl ApiResponse {
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// At most the first 100 characters of the body, for log lines.
    pub fn excerpt(&self) -> &str {
        match self.body.char_indices().nth(100) {
            Some((end, _)) => &self.body[..end],
            None => &self.body,
        }
    }
}

/// Sends requests to the system under test.
///
/// Implementations never fail: transport problems are reported through
/// [`ApiResponse::status`] being `None`.
pub trait Backend: Send + Sync + 'static {
    fn send(
        &self,
        token: Option<&str>,
        endpoint: Endpoint,
    ) -> impl Future<Output = ApiResponse> + Send;
}
