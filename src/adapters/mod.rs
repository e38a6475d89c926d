//! Thin HTTP wrappers around third-party data APIs
//!
//! Every failure (transport, status, body) comes back as
//! `AgentError::Adapter` so the executor can turn it into an error tool
//! result instead of aborting the turn.

pub mod finnhub;
pub mod sec;
pub mod tavily;
pub mod yahoo;

pub use finnhub::FinnhubClient;
pub use sec::SecClient;
pub use tavily::TavilyClient;
pub use yahoo::YahooSearchClient;

use crate::error::AgentError;
use crate::Result;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) research-agent/0.1";

/// Pooled JSON client shared by the adapters.
#[derive(Clone)]
pub struct HttpJson {
    client: Client,
    service: &'static str,
}

impl HttpJson {
    pub fn new(service: &'static str, timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build {} client: {}", service, e)))?;

        Ok(Self { client, service })
    }

    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(url, self.client.get(url).query(query)).await
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(url, self.client.post(url).json(body)).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Value> {
        debug!(service = self.service, url = %url, "Adapter request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(format!("{} request timed out: {}", self.service, e))
            } else {
                AgentError::Adapter(format!("{} request failed: {}", self.service, e))
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AgentError::Adapter(format!("{} response could not be read: {}", self.service, e))
        })?;

        if !status.is_success() {
            return Err(AgentError::Adapter(format!(
                "{} returned {}: {}",
                self.service,
                status,
                truncate(&text, 300)
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            AgentError::Adapter(format!("{} returned invalid JSON: {}", self.service, e))
        })
    }
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Error for a provider whose API key is absent.
pub(crate) fn not_configured(service: &str, key_var: &str) -> AgentError {
    AgentError::Config(format!("{} is not configured (set {})", service, key_var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_status_error_becomes_adapter_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .with_status(503)
            .with_body("upstream down")
            .create_async()
            .await;

        let http = HttpJson::new("Test", Duration::from_secs(5), None).unwrap();
        let result = http.get_json(&format!("{}/thing", server.url()), &[]).await;

        mock.assert_async().await;
        match result {
            Err(AgentError::Adapter(msg)) => assert!(msg.contains("503")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_adapter_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/echo")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let http = HttpJson::new("Test", Duration::from_secs(5), None).unwrap();
        let result = http
            .post_json(&format!("{}/echo", server.url()), &json!({"a": 1}))
            .await;
        assert!(matches!(result, Err(AgentError::Adapter(_))));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
