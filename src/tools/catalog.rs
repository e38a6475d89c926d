use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::models::ToolInput;
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListToolsArgs {}

/// `list_tools`: names and descriptions of the catalog it was built over.
pub struct ListToolsTool {
    entries: Vec<(&'static str, &'static str)>,
}

impl ListToolsTool {
    pub const NAME: &'static str = "list_tools";
    pub const DESCRIPTION: &'static str =
        "Lists all tools the assistant can use, with a short description of each.";

    pub fn new(entries: Vec<(&'static str, &'static str)>) -> Self {
        Self { entries }
    }
}

#[async_trait::async_trait]
impl Tool for ListToolsTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        schema_for::<ListToolsArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let _: ListToolsArgs = parse_args(input)?;

        let text = self
            .entries
            .iter()
            .map(|(name, description)| format!("**{}**:\n{}", name, description))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolOutcome::Completed(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{build_registry, testing};
    use serde_json::json;

    #[tokio::test]
    async fn test_listing_includes_itself() {
        let registry = build_registry(&testing::sources("http://127.0.0.1:9"));
        let tool = registry.get("list_tools").unwrap();

        let outcome = tool
            .execute(&testing::input("list_tools", json!({})), &testing::context())
            .await
            .unwrap();

        let ToolOutcome::Completed(Value::String(text)) = outcome else {
            panic!("expected text listing");
        };
        for name in registry.list() {
            assert!(text.contains(&format!("**{}**", name)), "missing {}", name);
        }
    }
}
