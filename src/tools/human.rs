use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::models::{HumanQuery, ToolInput};
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HumanAssistanceArgs {
    /// The question to put to the human.
    pub query: String,
}

/// `human_assistance`: always suspends the conversation.
pub struct HumanAssistanceTool;

#[async_trait::async_trait]
impl Tool for HumanAssistanceTool {
    fn name(&self) -> &'static str {
        "human_assistance"
    }

    fn description(&self) -> &'static str {
        "Request assistance from a human. Use when the request is ambiguous or needs a decision only the user can make."
    }

    fn input_schema(&self) -> Value {
        schema_for::<HumanAssistanceArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: HumanAssistanceArgs = parse_args(input)?;
        Ok(ToolOutcome::Interrupt(HumanQuery::new(args.query)))
    }
}
