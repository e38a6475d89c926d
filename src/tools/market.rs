//! Finnhub-backed market tools

use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::adapters::finnhub::{clamp_news_days, format_unix_timestamp};
use crate::adapters::FinnhubClient;
use crate::models::ToolInput;
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TickerArgs {
    /// Stock ticker symbol of the company (e.g. "AAPL").
    pub ticker: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EarningsArgs {
    /// Stock ticker symbol of the company (e.g. "AAPL").
    pub ticker: String,
    /// Number of most recent earnings records (default: 1).
    #[serde(default = "default_one")]
    pub n: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompanyNewsArgs {
    /// Stock ticker symbol of the company (e.g. "AAPL").
    pub ticker: String,
    /// How many days back to look, 1 to 365 (default: 7).
    #[serde(default = "default_days")]
    pub days: i64,
    /// Maximum number of articles (default: 5).
    #[serde(default = "default_articles")]
    pub n: usize,
}

fn default_one() -> usize {
    1
}

fn default_days() -> i64 {
    7
}

fn default_articles() -> usize {
    5
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

pub struct StockPriceTool {
    finnhub: Arc<FinnhubClient>,
}

impl StockPriceTool {
    pub fn new(finnhub: Arc<FinnhubClient>) -> Self {
        Self { finnhub }
    }
}

#[async_trait::async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &'static str {
        "get_stock_price"
    }

    fn description(&self) -> &'static str {
        "Retrieves the latest stock quote for a ticker: current price (c), change (d), percent change (dp), high (h), low (l), open (o), previous close (pc) and quote time (t, UTC)."
    }

    fn input_schema(&self) -> Value {
        schema_for::<TickerArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: TickerArgs = parse_args(input)?;
        let quote = self.finnhub.quote(&args.ticker).await?;

        // Finnhub answers unknown symbols with an all-zero quote
        let price = |field: &str| quote.get(field).and_then(Value::as_f64);
        if price("c") == Some(0.0) && price("pc") == Some(0.0) {
            return Ok(ToolOutcome::NotFound(format!("No quote for {}", args.ticker)));
        }
        Ok(ToolOutcome::Completed(quote))
    }
}

pub struct AnalystRatingTool {
    finnhub: Arc<FinnhubClient>,
}

impl AnalystRatingTool {
    pub fn new(finnhub: Arc<FinnhubClient>) -> Self {
        Self { finnhub }
    }
}

#[async_trait::async_trait]
impl Tool for AnalystRatingTool {
    fn name(&self) -> &'static str {
        "get_analyst_rating_summary"
    }

    fn description(&self) -> &'static str {
        "Retrieves the most recent analyst rating summary for a ticker: counts of strongBuy, buy, hold, sell and strongSell for the latest period."
    }

    fn input_schema(&self) -> Value {
        schema_for::<TickerArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: TickerArgs = parse_args(input)?;
        let trends = self.finnhub.recommendation_trends(&args.ticker).await?;

        match trends.as_array().and_then(|t| t.first()) {
            Some(latest) => Ok(ToolOutcome::Completed(latest.clone())),
            None => Ok(ToolOutcome::NotFound(format!(
                "No analyst ratings for {}",
                args.ticker
            ))),
        }
    }
}

pub struct EarningsTool {
    finnhub: Arc<FinnhubClient>,
}

impl EarningsTool {
    pub fn new(finnhub: Arc<FinnhubClient>) -> Self {
        Self { finnhub }
    }
}

#[async_trait::async_trait]
impl Tool for EarningsTool {
    fn name(&self) -> &'static str {
        "get_earnings"
    }

    fn description(&self) -> &'static str {
        "Retrieves the most recent quarterly earnings for a ticker: actual and estimated EPS, period, quarter, year and surprise."
    }

    fn input_schema(&self) -> Value {
        schema_for::<EarningsArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: EarningsArgs = parse_args(input)?;
        let earnings = self
            .finnhub
            .company_earnings(&args.ticker, args.n.max(1))
            .await?;

        if is_empty_payload(&earnings) {
            return Ok(ToolOutcome::NotFound(format!(
                "No earnings reported for {}",
                args.ticker
            )));
        }
        Ok(ToolOutcome::Completed(earnings))
    }
}

pub struct CompanyNewsTool {
    finnhub: Arc<FinnhubClient>,
}

impl CompanyNewsTool {
    pub fn new(finnhub: Arc<FinnhubClient>) -> Self {
        Self { finnhub }
    }
}

#[async_trait::async_trait]
impl Tool for CompanyNewsTool {
    fn name(&self) -> &'static str {
        "get_company_news"
    }

    fn description(&self) -> &'static str {
        "Retrieves recent news headlines for a ticker (headline, source, summary, url, datetime)."
    }

    fn input_schema(&self) -> Value {
        schema_for::<CompanyNewsArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: CompanyNewsArgs = parse_args(input)?;
        let days = clamp_news_days(args.days);
        let news = self.finnhub.company_news(&args.ticker, days).await?;

        let articles: Vec<Value> = news
            .as_array()
            .into_iter()
            .flatten()
            .take(args.n.max(1))
            .map(|article| {
                let mut article = article.clone();
                if let Some(ts) = article.get("datetime").and_then(Value::as_i64) {
                    article["datetime"] = Value::String(format_unix_timestamp(ts));
                }
                article
            })
            .collect();

        if articles.is_empty() {
            return Ok(ToolOutcome::NotFound(format!(
                "No news for {} in the last {} days",
                args.ticker, days
            )));
        }
        Ok(ToolOutcome::Completed(Value::Array(articles)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_rating_summary_takes_latest_period() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stock/recommendation")
            .match_query(Matcher::UrlEncoded("symbol".into(), "AAPL".into()))
            .with_status(200)
            .with_body(
                json!([
                    {"buy": 24, "hold": 7, "period": "2025-03-01", "sell": 1, "strongBuy": 13, "strongSell": 0, "symbol": "AAPL"},
                    {"buy": 23, "hold": 8, "period": "2025-02-01", "sell": 1, "strongBuy": 12, "strongSell": 0, "symbol": "AAPL"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let tool = AnalystRatingTool::new(testing::sources(&server.url()).finnhub);
        let outcome = tool
            .execute(
                &testing::input("get_analyst_rating_summary", json!({"ticker": "AAPL"})),
                &testing::context(),
            )
            .await
            .unwrap();

        let ToolOutcome::Completed(latest) = outcome else {
            panic!("expected completed");
        };
        assert_eq!(latest["period"], "2025-03-01");
    }

    #[tokio::test]
    async fn test_unknown_symbol_quote_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0}).to_string())
            .create_async()
            .await;

        let tool = StockPriceTool::new(testing::sources(&server.url()).finnhub);
        let outcome = tool
            .execute(
                &testing::input("get_stock_price", json!({"ticker": "ZZZZ"})),
                &testing::context(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ToolOutcome::NotFound(_)));
    }

    #[tokio::test]
    async fn test_news_limited_and_timestamps_rendered() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/company-news")
            .match_query(Matcher::UrlEncoded("symbol".into(), "MU".into()))
            .with_status(200)
            .with_body(
                json!([
                    {"headline": "a", "datetime": 0},
                    {"headline": "b", "datetime": 0},
                    {"headline": "c", "datetime": 0}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let tool = CompanyNewsTool::new(testing::sources(&server.url()).finnhub);
        let outcome = tool
            .execute(
                &testing::input("get_company_news", json!({"ticker": "MU", "n": 2})),
                &testing::context(),
            )
            .await
            .unwrap();

        let ToolOutcome::Completed(Value::Array(articles)) = outcome else {
            panic!("expected articles");
        };
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0]["datetime"], "1970-01-01 00:00:00 UTC");
    }

    #[tokio::test]
    async fn test_news_window_too_wide_is_clamped() {
        let (from, _) =
            crate::adapters::finnhub::news_window(chrono::Utc::now().date_naive(), 365).unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/company-news")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "MU".into()),
                Matcher::UrlEncoded("from".into(), from.format("%Y-%m-%d").to_string()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let tool = CompanyNewsTool::new(testing::sources(&server.url()).finnhub);
        let outcome = tool
            .execute(
                &testing::input("get_company_news", json!({"ticker": "MU", "days": 100000000})),
                &testing::context(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            outcome,
            ToolOutcome::NotFound("No news for MU in the last 365 days".to_string())
        );
    }
}
