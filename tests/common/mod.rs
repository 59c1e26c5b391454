#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;
use warung_load::backend::{ApiResponse, Backend, Endpoint};

pub type Reply = (Option<u16>, String);
type Override = dyn Fn(&Endpoint) -> Option<Reply> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub token: Option<String>,
    pub endpoint: Endpoint,
}

/// In-memory backend answering like a healthy store, with per-test
/// overrides, and remembering every request it received.
#[derive(Clone)]
pub struct MockBackend {
    overrides: Arc<Override>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl MockBackend {
    pub fn healthy() -> Self {
        Self::with(|_| None)
    }

    pub fn with<F>(overrides: F) -> Self
    where
        F: Fn(&Endpoint) -> Option<Reply> + Send + Sync + 'static,
    {
        Self {
            overrides: Arc::new(overrides),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

pub fn reply(status: u16, body: serde_json::Value) -> Option<Reply> {
    Some((Some(status), body.to_string()))
}

pub fn healthy_reply(endpoint: &Endpoint) -> Reply {
    let (status, body) = match endpoint {
        Endpoint::Login { email, .. } => (200, json!({"data": {"access_token": format!("tok-{email}")}})),
        Endpoint::ListProducts(_) => (
            200,
            json!({"data": [
                {"id": 1, "name": "Indomie Goreng", "base_price": 3500, "current_stock": 40},
                {"id": 2, "name": "Aqua 600ml", "base_price": 4000, "current_stock": 12},
                {"id": 3, "name": "Gula 1kg", "base_price": 16000, "current_stock": 3}
            ]}),
        ),
        Endpoint::ListCustomers { .. } => (
            200,
            json!({"data": [{"id": 10, "name": "Bu Siti", "credit_limit": 500000, "current_debt": 0}]}),
        ),
        Endpoint::ListCategories => (200, json!({"data": [{"id": 5, "name": "Minuman"}]})),
        Endpoint::CalculateCart { .. } => (200, json!({"data": {"total_amount": 23500}})),
        // the API decodes amounts into integers and rejects anything else
        Endpoint::CreateTransaction(_) => match endpoint.body() {
            Some(body) if body["amount_paid"].is_i64() => (201, json!({"data": {"id": 99}})),
            _ => (400, json!({"error": "invalid request body"})),
        },
        Endpoint::ProductDetail { .. } => (404, json!({"error": "product not found"})),
        Endpoint::CreateCustomer { .. } => (201, json!({"data": {"id": 77}})),
        _ => (200, json!({"data": []})),
    };
    (Some(status), body.to_string())
}

impl Backend for MockBackend {
    async fn send(&self, token: Option<&str>, endpoint: Endpoint) -> ApiResponse {
        let (status, body) = (self.overrides)(&endpoint).unwrap_or_else(|| healthy_reply(&endpoint));
        self.requests.lock().unwrap().push(Request {
            token: token.map(str::to_owned),
            endpoint,
        });
        ApiResponse {
            status,
            body,
            latency: Duration::from_millis(5),
        }
    }
}
