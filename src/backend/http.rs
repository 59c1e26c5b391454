use std::time::{Duration, Instant};

use reqwest::Client;

use super::{ApiResponse, Backend, Endpoint};
use crate::error::Result;

/// [`Backend`] talking to the real API over HTTP.
///
/// The underlying [`Client`] pools connections and is cheap to clone, so a
/// single instance is shared by every virtual user. Never build one per
/// iteration.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, api_prefix: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let api_url = format!("{base_url}{api_prefix}");
        Ok(Self {
            client,
            base_url,
            api_url,
        })
    }

    fn url(&self, endpoint: &Endpoint) -> String {
        let root = if endpoint.is_auth() {
            &self.base_url
        } else {
            &self.api_url
        };
        format!("{root}{}", endpoint.path())
    }
}

impl Backend for HttpBackend {
    async fn send(&self, token: Option<&str>, endpoint: Endpoint) -> ApiResponse {
        let mut request = self
            .client
            .request(endpoint.method(), self.url(&endpoint))
            .query(&endpoint.query());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = endpoint.body() {
            request = request.json(&body);
        }

        let start = Instant::now();
        let result = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                response.text().await.map(|body| (status, body))
            }
            Err(e) => Err(e),
        };
        let latency = start.elapsed();

        match result {
            Ok((status, body)) => ApiResponse {
                status: Some(status),
                body,
                latency,
            },
            Err(e) => {
                tracing::debug!("{} {} failed: {e}", endpoint.method(), endpoint.path());
                ApiResponse {
                    status: None,
                    body: e.to_string(),
                    latency,
                }
            }
        }
    }
}
