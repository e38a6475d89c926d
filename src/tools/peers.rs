use super::{parse_args, schema_for, DataSources, Tool, ToolContext, ToolOutcome};
use crate::adapters::sec::{FormType, StatementType};
use crate::error::AgentError;
use crate::models::ToolInput;
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::warn;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PeerComparisonArgs {
    /// Ticker symbols to compare, the client's own ticker included (e.g. ["MU", "WDC"]).
    pub tickers: Vec<String>,
}

pub struct PeerComparisonTool {
    sources: DataSources,
    ticker_timeout: Duration,
}

impl PeerComparisonTool {
    /// Each ticker gets most of the tool deadline so a slow one is reported
    /// on its own instead of timing out the whole comparison.
    pub fn new(sources: DataSources) -> Self {
        let ticker_timeout = sources.tool_timeout.mul_f64(0.8);
        Self {
            sources,
            ticker_timeout,
        }
    }

    pub fn with_ticker_timeout(mut self, ticker_timeout: Duration) -> Self {
        self.ticker_timeout = ticker_timeout;
        self
    }
}

async fn gather_one(sources: DataSources, ticker: String) -> Result<Value> {
    let statements = sources
        .sec
        .financial_statements(
            &ticker,
            FormType::TenK,
            &[StatementType::Income, StatementType::BalanceSheet],
            1,
        )
        .await?;

    let finnhub = &sources.finnhub;
    let (price, rating, earnings) = tokio::try_join!(
        finnhub.quote(&ticker),
        finnhub.recommendation_trends(&ticker),
        finnhub.company_earnings(&ticker, 4),
    )?;

    Ok(json!({
        "income_statement": statements.first(),
        "balance_sheet": statements.get(1),
        "stock_price": price,
        "analyst_rating": rating.as_array().and_then(|r| r.first()).cloned().unwrap_or(Value::Null),
        "earnings": earnings,
    }))
}

#[async_trait::async_trait]
impl Tool for PeerComparisonTool {
    fn name(&self) -> &'static str {
        "run_peer_comparison"
    }

    fn description(&self) -> &'static str {
        "Gathers income statement, balance sheet, stock price, analyst rating and recent earnings for each ticker and returns them with a comparison brief (revenue, cost structure, profitability, leverage, valuation). Failures are reported per ticker."
    }

    fn input_schema(&self) -> Value {
        schema_for::<PeerComparisonArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: PeerComparisonArgs = parse_args(input)?;
        if args.tickers.is_empty() {
            return Err(AgentError::InvalidToolInput(
                "tickers must contain at least one symbol".to_string(),
            ));
        }

        let mut tasks = JoinSet::new();
        for ticker in &args.tickers {
            let ticker = ticker.trim().to_uppercase();
            let sources = self.sources.clone();
            let deadline = self.ticker_timeout;

            tasks.spawn(async move {
                let result = match timeout(deadline, gather_one(sources, ticker.clone())).await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Timeout(format!(
                        "{} data timed out after {:.1}s",
                        ticker,
                        deadline.as_secs_f64()
                    ))),
                };
                (ticker, result)
            });
        }

        let mut peer_data = Map::new();
        while let Some(joined) = tasks.join_next().await {
            let (ticker, result) = joined
                .map_err(|e| AgentError::Adapter(format!("peer data task failed: {}", e)))?;
            let entry = result.unwrap_or_else(|e| {
                warn!(ticker = %ticker, "Peer data unavailable: {}", e);
                json!({"error": e.to_string()})
            });
            peer_data.insert(ticker, entry);
        }

        let brief = format_peer_comparison(&peer_data);
        Ok(ToolOutcome::Completed(json!({
            "peer_data": peer_data,
            "comparison_brief": brief,
        })))
    }
}

fn format_peer_comparison(peer_data: &Map<String, Value>) -> String {
    let mut brief = String::from("Compare the following companies across:\n");
    brief.push_str("- Revenue\n- Cost Structure\n- Profitability\n- Leverage\n- Stock and Valuation\n\n");
    brief.push_str("Here is the raw data:\n");

    for (ticker, data) in peer_data {
        brief.push_str(&format!("\n### {} ###\n", ticker));
        if let Some(error) = data.get("error") {
            brief.push_str(&format!("Error: {}\n", error.as_str().unwrap_or_default()));
            continue;
        }
        for (label, key) in [
            ("Income Statement", "income_statement"),
            ("Balance Sheet", "balance_sheet"),
            ("Stock Price", "stock_price"),
            ("Analyst Rating", "analyst_rating"),
            ("Earnings", "earnings"),
        ] {
            brief.push_str(&format!("{}: {}\n", label, data.get(key).unwrap_or(&Value::Null)));
        }
    }

    brief.push_str("\nPlease provide a concise peer comparison.");
    brief
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;

    #[tokio::test]
    async fn test_per_ticker_errors_are_captured() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files/company_tickers.json")
            .with_status(200)
            .with_body(json!({"0": {"cik_str": 723125, "ticker": "MU", "title": "MICRON TECHNOLOGY INC"}}).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/api/xbrl/companyfacts/CIK0000723125.json")
            .with_status(500)
            .create_async()
            .await;

        let tool = PeerComparisonTool::new(testing::sources(&server.url()));
        let outcome = tool
            .execute(
                &testing::input("run_peer_comparison", json!({"tickers": ["mu", "ZZZZ"]})),
                &testing::context(),
            )
            .await
            .unwrap();

        let ToolOutcome::Completed(result) = outcome else {
            panic!("expected completed");
        };
        assert!(result["peer_data"]["MU"]["error"].as_str().unwrap().contains("500"));
        assert!(result["peer_data"]["ZZZZ"]["error"].is_string());
        let brief = result["comparison_brief"].as_str().unwrap();
        assert!(brief.contains("### MU ###"));
        assert!(brief.ends_with("Please provide a concise peer comparison."));
    }

    #[tokio::test]
    async fn test_slow_ticker_is_reported_on_its_own() {
        let server = mockito::Server::new_async().await;

        let tool = PeerComparisonTool::new(testing::sources(&server.url()))
            .with_ticker_timeout(Duration::ZERO);
        let outcome = tool
            .execute(
                &testing::input("run_peer_comparison", json!({"tickers": ["MU", "WDC"]})),
                &testing::context(),
            )
            .await
            .unwrap();

        let ToolOutcome::Completed(result) = outcome else {
            panic!("expected completed");
        };
        for ticker in ["MU", "WDC"] {
            let error = result["peer_data"][ticker]["error"].as_str().unwrap();
            assert!(error.contains("timed out"), "{}", error);
        }
    }

    #[test]
    fn test_ticker_deadline_inside_tool_deadline() {
        let sources = testing::sources("http://127.0.0.1:9");
        let tool_timeout = sources.tool_timeout;
        let tool = PeerComparisonTool::new(sources);
        assert!(tool.ticker_timeout < tool_timeout);
    }

    #[test]
    fn test_brief_lists_sections() {
        let mut data = Map::new();
        data.insert(
            "AAPL".to_string(),
            json!({"income_statement": {}, "balance_sheet": {}, "stock_price": {"c": 1.0}, "analyst_rating": null, "earnings": []}),
        );
        let brief = format_peer_comparison(&data);
        assert!(brief.contains("Stock Price: {\"c\":1.0}"));
        assert!(brief.contains("Analyst Rating: null"));
    }
}
