use super::{parse_args, schema_for, Tool, ToolContext, ToolOutcome};
use crate::adapters::TavilyClient;
use crate::models::ToolInput;
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchArgs {
    /// The search query.
    pub query: String,
    /// Number of top results to return (default: 3).
    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_num_results() -> usize {
    3
}

pub struct WebSearchTool {
    tavily: Arc<TavilyClient>,
}

impl WebSearchTool {
    pub fn new(tavily: Arc<TavilyClient>) -> Self {
        Self { tavily }
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Performs a web search using Tavily and returns the top results (title, url, content)."
    }

    fn input_schema(&self) -> Value {
        schema_for::<WebSearchArgs>()
    }

    async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let args: WebSearchArgs = parse_args(input)?;
        let results = self.tavily.search(&args.query, args.num_results.max(1)).await?;

        if results.is_empty() {
            return Ok(ToolOutcome::NotFound(format!(
                "No web results for '{}'",
                args.query
            )));
        }
        Ok(ToolOutcome::Completed(Value::Array(results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_default_num_results_is_three() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(Matcher::PartialJson(json!({"max_results": 3})))
            .with_status(200)
            .with_body(json!({"results": [{"title": "t", "url": "u", "content": "c"}]}).to_string())
            .create_async()
            .await;

        let tool = WebSearchTool::new(testing::sources(&server.url()).tavily);
        let outcome = tool
            .execute(
                &testing::input("web_search", json!({"query": "HBM demand 2025"})),
                &testing::context(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(matches!(outcome, ToolOutcome::Completed(Value::Array(ref r)) if r.len() == 1));
    }
}
