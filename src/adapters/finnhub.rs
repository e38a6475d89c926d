//! Finnhub market data: quotes, analyst recommendations, earnings, news

use super::{not_configured, trim_base, HttpJson};
use crate::error::AgentError;
use crate::Result;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde_json::Value;
use std::time::Duration;

/// Widest news window requested from Finnhub.
pub const MAX_NEWS_DAYS: i64 = 365;

pub struct FinnhubClient {
    http: HttpJson,
    base_url: String,
    api_key: Option<String>,
}

impl FinnhubClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpJson::new("Finnhub", timeout, None)?,
            base_url: trim_base(base_url),
            api_key,
        })
    }

    async fn call(&self, path: &str, mut query: Vec<(&str, String)>) -> Result<Value> {
        let token = self
            .api_key
            .as_deref()
            .ok_or_else(|| not_configured("Finnhub", "FINNHUB_API_KEY"))?;
        query.push(("token", token.to_string()));

        self.http
            .get_json(&format!("{}{}", self.base_url, path), &query)
            .await
    }

    /// Latest quote. The `t` field is rendered as UTC text.
    pub async fn quote(&self, ticker: &str) -> Result<Value> {
        let mut quote = self
            .call("/quote", vec![("symbol", ticker.to_uppercase())])
            .await?;

        if let Some(ts) = quote.get("t").and_then(Value::as_i64) {
            quote["t"] = Value::String(format_unix_timestamp(ts));
        }
        Ok(quote)
    }

    /// Recommendation trends, newest period first.
    pub async fn recommendation_trends(&self, ticker: &str) -> Result<Value> {
        self.call(
            "/stock/recommendation",
            vec![("symbol", ticker.to_uppercase())],
        )
        .await
    }

    pub async fn company_earnings(&self, ticker: &str, limit: usize) -> Result<Value> {
        self.call(
            "/stock/earnings",
            vec![("symbol", ticker.to_uppercase()), ("limit", limit.to_string())],
        )
        .await
    }

    /// News published over the last `days` days, clamped to `1..=MAX_NEWS_DAYS`.
    pub async fn company_news(&self, ticker: &str, days: i64) -> Result<Value> {
        let (from, to) = news_window(Utc::now().date_naive(), days)?;

        self.call(
            "/company-news",
            vec![
                ("symbol", ticker.to_uppercase()),
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
            ],
        )
        .await
    }
}

pub fn clamp_news_days(days: i64) -> i64 {
    days.clamp(1, MAX_NEWS_DAYS)
}

/// `(from, to)` dates for a news query ending on `today`.
pub fn news_window(today: NaiveDate, days: i64) -> Result<(NaiveDate, NaiveDate)> {
    TimeDelta::try_days(clamp_news_days(days))
        .and_then(|span| today.checked_sub_signed(span))
        .map(|from| (from, today))
        .ok_or_else(|| AgentError::InvalidToolInput(format!("days out of range: {}", days)))
}

pub fn format_unix_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_news_window_is_clamped() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();

        let (from, to) = news_window(today, 7).unwrap();
        assert_eq!((from.to_string(), to), ("2025-03-08".to_string(), today));

        let (from, _) = news_window(today, 100_000_000).unwrap();
        assert_eq!(from.to_string(), "2024-03-15");

        let (from, _) = news_window(today, -3).unwrap();
        assert_eq!(from.to_string(), "2025-03-14");

        let (from, _) = news_window(today, i64::MAX).unwrap();
        assert_eq!(from.to_string(), "2024-03-15");
    }

    #[test]
    fn test_format_unix_timestamp() {
        assert_eq!(format_unix_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_unix_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[tokio::test]
    async fn test_quote_renders_timestamp() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "AAPL".into()),
                Matcher::UrlEncoded("token".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_body(json!({"c": 189.5, "d": 1.2, "dp": 0.64, "t": 0}).to_string())
            .create_async()
            .await;

        let client = FinnhubClient::new(
            &server.url(),
            Some("test-key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let quote = client.quote("aapl").await.unwrap();

        mock.assert_async().await;
        assert_eq!(quote["c"], json!(189.5));
        assert_eq!(quote["t"], json!("1970-01-01 00:00:00 UTC"));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client = FinnhubClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let result = client.recommendation_trends("MU").await;
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
