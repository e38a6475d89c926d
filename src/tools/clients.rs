//! Client records kept in session memory under `("clients",)`

use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::error::AgentError;
use crate::memory::Namespace;
use crate::models::{ClientRecord, ToolInput};
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// Accepts `CIK0000723125`, `cik723125` or a bare number.
pub fn normalize_cik(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("CIK")
        .or_else(|| trimmed.strip_prefix("cik"))
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AgentError::InvalidToolInput(format!(
            "'{}' is not a CIK (expected e.g. 'CIK0001730168')",
            raw
        )));
    }
    Ok(format!("CIK{:0>10}", digits))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveClientArgs {
    /// The client company to remember.
    pub client: ClientRecord,
}

pub struct SaveClientInfoTool;

#[async_trait::async_trait]
impl Tool for SaveClientInfoTool {
    fn name(&self) -> &'static str {
        "save_client_info"
    }

    fn description(&self) -> &'static str {
        "Saves a client company record (cik, name, tickers, optional peers) to memory, keyed by CIK. Overwrites any existing record."
    }

    fn input_schema(&self) -> Value {
        schema_for::<SaveClientArgs>()
    }

    async fn execute(&self, input: &ToolInput, ctx: &ToolContext) -> Result<ToolOutcome> {
        let SaveClientArgs { mut client } = parse_args(input)?;

        client.cik = normalize_cik(&client.cik)?;
        if client.tickers.is_empty() {
            return Err(AgentError::InvalidToolInput(
                "client.tickers must contain at least one ticker".to_string(),
            ));
        }

        ctx.memory
            .put(&Namespace::clients(), &client.cik, serde_json::to_value(&client)?)
            .await?;

        info!(thread_id = %ctx.thread_id, cik = %client.cik, "Client record saved");
        Ok(ToolOutcome::Completed(json!({
            "status": "saved",
            "cik": client.cik,
        })))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetClientArgs {
    /// Client CIK of the form 'CIK0001730168'.
    pub company_cik: String,
}

pub struct GetClientInfoTool;

#[async_trait::async_trait]
impl Tool for GetClientInfoTool {
    fn name(&self) -> &'static str {
        "get_client_info"
    }

    fn description(&self) -> &'static str {
        "Looks up a saved client company record by CIK. Returns 'Unknown client' when nothing is saved."
    }

    fn input_schema(&self) -> Value {
        schema_for::<GetClientArgs>()
    }

    async fn execute(&self, input: &ToolInput, ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: GetClientArgs = parse_args(input)?;
        let cik = normalize_cik(&args.company_cik)?;

        match ctx.memory.get(&Namespace::clients(), &cik).await? {
            Some(item) => Ok(ToolOutcome::Completed(item.value)),
            None => Ok(ToolOutcome::NotFound("Unknown client".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;

    #[test]
    fn test_normalize_cik() {
        assert_eq!(normalize_cik("CIK0000723125").unwrap(), "CIK0000723125");
        assert_eq!(normalize_cik(" 723125 ").unwrap(), "CIK0000723125");
        assert_eq!(normalize_cik("cik1730168").unwrap(), "CIK0001730168");
        assert!(normalize_cik("MU").is_err());
        assert!(normalize_cik("CIK12345678901").is_err());
    }

    #[tokio::test]
    async fn test_save_then_get_client() {
        let ctx = testing::context();

        let saved = SaveClientInfoTool
            .execute(
                &testing::input(
                    "save_client_info",
                    json!({"client": {"cik": "723125", "name": "Micron Technology", "tickers": ["MU"]}}),
                ),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            saved,
            ToolOutcome::Completed(json!({"status": "saved", "cik": "CIK0000723125"}))
        );

        let fetched = GetClientInfoTool
            .execute(
                &testing::input("get_client_info", json!({"company_cik": "CIK0000723125"})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            fetched,
            ToolOutcome::Completed(
                json!({"cik": "CIK0000723125", "name": "Micron Technology", "tickers": ["MU"]})
            )
        );
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let outcome = GetClientInfoTool
            .execute(
                &testing::input("get_client_info", json!({"company_cik": "CIK0001730168"})),
                &testing::context(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::NotFound("Unknown client".to_string()));
    }

    #[tokio::test]
    async fn test_save_requires_ticker() {
        let result = SaveClientInfoTool
            .execute(
                &testing::input(
                    "save_client_info",
                    json!({"client": {"cik": "CIK0000723125", "name": "Micron", "tickers": []}}),
                ),
                &testing::context(),
            )
            .await;
        assert!(matches!(result, Err(AgentError::InvalidToolInput(_))));
    }
}
