//! Entity resolution: company name → ticker, company name or ticker → CIK
//!
//! Exactly one match resolves on its own, several matches go to a human.

use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::adapters::{SecClient, YahooSearchClient};
use crate::models::{HumanQuery, TickerMatch, ToolInput};
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Numbered option list shown to the human.
fn choice_query(found: usize, plural: &str, singular: &str, lines: &[String]) -> String {
    let options = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Found {} {}:\n{}\nHelp me select the right {}.",
        found, plural, options, singular
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TickerLookupArgs {
    /// The name of the company to search for (e.g. "Apple").
    pub company_name: String,
}

pub struct TickerLookupTool {
    yahoo: Arc<YahooSearchClient>,
}

impl TickerLookupTool {
    pub fn new(yahoo: Arc<YahooSearchClient>) -> Self {
        Self { yahoo }
    }
}

#[async_trait::async_trait]
impl Tool for TickerLookupTool {
    fn name(&self) -> &'static str {
        "get_ticker_given_name"
    }

    fn description(&self) -> &'static str {
        "Searches for the ticker symbol of a company by name using Yahoo Finance search. Returns {name, symbol}. If more than one ticker matches, asks a human to pick."
    }

    fn input_schema(&self) -> Value {
        schema_for::<TickerLookupArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: TickerLookupArgs = parse_args(input)?;
        let matches = self.yahoo.search(&args.company_name).await?;
        debug!(company = %args.company_name, matches = matches.len(), "Ticker search");

        Ok(resolve_ticker_matches(matches))
    }
}

fn resolve_ticker_matches(mut matches: Vec<TickerMatch>) -> ToolOutcome {
    match matches.len() {
        0 => ToolOutcome::NotFound("No matching ticker found.".to_string()),
        1 => {
            let only = matches.remove(0);
            ToolOutcome::Completed(json!({"name": only.name, "symbol": only.symbol}))
        }
        found => {
            let lines: Vec<String> = matches
                .iter()
                .map(|m| format!("{} ({})", m.name, m.symbol))
                .collect();
            let options = matches
                .iter()
                .map(|m| json!({"name": m.name, "symbol": m.symbol}))
                .collect();
            ToolOutcome::Interrupt(HumanQuery::choose_from(
                choice_query(found, "tickers", "ticker", &lines),
                options,
            ))
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CikLookupArgs {
    /// The name of the entity (e.g. "Micron Technology") or its ticker.
    pub name: String,
}

pub struct CikLookupTool {
    sec: Arc<SecClient>,
}

impl CikLookupTool {
    pub fn new(sec: Arc<SecClient>) -> Self {
        Self { sec }
    }
}

#[async_trait::async_trait]
impl Tool for CikLookupTool {
    fn name(&self) -> &'static str {
        "get_cik"
    }

    fn description(&self) -> &'static str {
        "Fetches the CIK (Central Index Key) of an entity given its name or ticker. Returns {cik, name, ticker} with the CIK formatted like 'CIK0001730168'."
    }

    fn input_schema(&self) -> Value {
        schema_for::<CikLookupArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: CikLookupArgs = parse_args(input)?;
        let companies = self.sec.search_companies(&args.name).await?;

        let entries: Vec<Value> = companies
            .iter()
            .map(|c| json!({"cik": c.formatted_cik(), "name": c.title, "ticker": c.ticker}))
            .collect();

        Ok(match entries.len() {
            0 => ToolOutcome::NotFound(format!("No SEC registrant matches '{}'.", args.name)),
            1 => ToolOutcome::Completed(entries[0].clone()),
            found => {
                let lines: Vec<String> = companies
                    .iter()
                    .map(|c| format!("{} ({}, {})", c.title, c.ticker, c.formatted_cik()))
                    .collect();
                ToolOutcome::Interrupt(HumanQuery::choose_from(
                    choice_query(found, "companies", "company", &lines),
                    entries,
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;

    fn tm(name: &str, symbol: &str) -> TickerMatch {
        TickerMatch {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }

    #[test]
    fn test_zero_one_many_matches() {
        assert!(matches!(resolve_ticker_matches(vec![]), ToolOutcome::NotFound(_)));

        assert_eq!(
            resolve_ticker_matches(vec![tm("Apple Inc.", "AAPL")]),
            ToolOutcome::Completed(json!({"name": "Apple Inc.", "symbol": "AAPL"}))
        );

        let outcome = resolve_ticker_matches(vec![
            tm("Micron Technology", "MU"),
            tm("Micron Solutions", "MICR"),
            tm("Micron Tech GmbH", "MTE.DE"),
        ]);
        let ToolOutcome::Interrupt(query) = outcome else {
            panic!("expected interrupt");
        };
        assert_eq!(query.options.len(), 3);
        assert!(query.query.starts_with("Found 3 tickers:"));
        assert!(query.query.contains("2. Micron Solutions (MICR)"));
        assert!(query.query.ends_with("Help me select the right ticker."));
    }

    #[tokio::test]
    async fn test_cik_lookup_single_company() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files/company_tickers.json")
            .with_status(200)
            .with_body(
                json!({
                    "0": {"cik_str": 723125, "ticker": "MU", "title": "MICRON TECHNOLOGY INC"},
                    "1": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let tool = CikLookupTool::new(testing::sources(&server.url()).sec);
        let outcome = tool
            .execute(
                &testing::input("get_cik", json!({"name": "Micron Technology"})),
                &testing::context(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ToolOutcome::Completed(
                json!({"cik": "CIK0000723125", "name": "MICRON TECHNOLOGY INC", "ticker": "MU"})
            )
        );
    }
}
