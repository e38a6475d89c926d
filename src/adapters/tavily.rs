//! Tavily web search

use super::{not_configured, trim_base, HttpJson};
use crate::Result;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TavilyClient {
    http: HttpJson,
    base_url: String,
    api_key: Option<String>,
}

impl TavilyClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpJson::new("Tavily", timeout, None)?,
            base_url: trim_base(base_url),
            api_key,
        })
    }

    /// Top results as `{title, url, content}` objects.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Value>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| not_configured("Tavily", "TAVILY_API_KEY"))?;

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": max_results,
        });
        let response = self
            .http
            .post_json(&format!("{}/search", self.base_url), &body)
            .await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .take(max_results)
            .map(|r| {
                json!({
                    "title": r.get("title").cloned().unwrap_or(Value::Null),
                    "url": r.get("url").cloned().unwrap_or(Value::Null),
                    "content": r.get("content").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        Ok(results)
    }
}
