use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::adapters::sec::{FormType, StatementType};
use crate::adapters::SecClient;
use crate::models::ToolInput;
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LatestFilingsArgs {
    /// Stock ticker symbol (e.g. "AAPL").
    pub ticker: String,
    /// Form type to filter on (e.g. "10-K", "10-Q", "8-K"). All forms when omitted.
    #[serde(default)]
    pub form_type: Option<String>,
    /// Number of filings to retrieve (default: 5).
    #[serde(default = "default_filings")]
    pub n: usize,
}

fn default_filings() -> usize {
    5
}

pub struct LatestFilingsTool {
    sec: Arc<SecClient>,
}

impl LatestFilingsTool {
    pub fn new(sec: Arc<SecClient>) -> Self {
        Self { sec }
    }
}

#[async_trait::async_trait]
impl Tool for LatestFilingsTool {
    fn name(&self) -> &'static str {
        "get_latest_filings"
    }

    fn description(&self) -> &'static str {
        "Fetches the latest SEC filings for a ticker, newest first. If form_type is given, only filings of that form are returned."
    }

    fn input_schema(&self) -> Value {
        schema_for::<LatestFilingsArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: LatestFilingsArgs = parse_args(input)?;
        let form_type = args.form_type.as_deref().filter(|f| !f.trim().is_empty());

        let filings = self
            .sec
            .latest_filings(&args.ticker, form_type, args.n.max(1))
            .await?;

        if filings.is_empty() {
            return Ok(ToolOutcome::NotFound(format!(
                "No {} filings found for {}",
                form_type.unwrap_or("recent"),
                args.ticker
            )));
        }
        Ok(ToolOutcome::Completed(serde_json::to_value(filings)?))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FinancialStatementArgs {
    /// Stock ticker symbol (e.g. "AAPL", "MSFT").
    pub ticker: String,
    /// "10-K" for annual statements (more comprehensive), "10-Q" for quarterly ones (more recent).
    pub form_type: FormType,
    /// One of "cashflow", "balance_sheet" or "income".
    pub statement_type: StatementType,
    /// Number of reporting periods to return (default: 1).
    #[serde(default = "default_periods")]
    pub n: usize,
}

fn default_periods() -> usize {
    1
}

pub struct FinancialStatementTool {
    sec: Arc<SecClient>,
}

impl FinancialStatementTool {
    pub fn new(sec: Arc<SecClient>) -> Self {
        Self { sec }
    }
}

#[async_trait::async_trait]
impl Tool for FinancialStatementTool {
    fn name(&self) -> &'static str {
        "get_financial_statement"
    }

    fn description(&self) -> &'static str {
        "Fetches a financial statement (cash flow, balance sheet or income statement) for a ticker from SEC XBRL data. Rows are line items, columns are reporting periods."
    }

    fn input_schema(&self) -> Value {
        schema_for::<FinancialStatementArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: FinancialStatementArgs = parse_args(input)?;
        let table = self
            .sec
            .financial_statement(&args.ticker, args.form_type, args.statement_type, args.n)
            .await?;

        Ok(ToolOutcome::Completed(serde_json::to_value(table)?))
    }
}
