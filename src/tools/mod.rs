//! Tool trait and registry
//!
//! Each tool declares a typed argument struct. Its JSON schema is generated
//! with `schemars` and handed to the model; the arguments the model sends back
//! are validated by deserializing into the same struct.

pub mod catalog;
pub mod clients;
pub mod filings;
pub mod human;
pub mod lookup;
pub mod market;
pub mod peers;
pub mod search;

use crate::adapters::{FinnhubClient, SecClient, TavilyClient, YahooSearchClient};
use crate::config::Settings;
use crate::error::AgentError;
use crate::memory::MemoryStore;
use crate::models::{HumanQuery, ToolInput, ToolSpec};
use crate::Result;
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What a tool hands back to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Completed(Value),
    /// Lookup found nothing; reported to the model, not an error.
    NotFound(String),
    /// The tool cannot decide without a human.
    Interrupt(HumanQuery),
}

/// Per-invocation handles passed in by the agent.
#[derive(Clone)]
pub struct ToolContext {
    pub memory: Arc<dyn MemoryStore>,
    pub thread_id: Uuid,
}

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: &ToolInput, ctx: &ToolContext) -> Result<ToolOutcome>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors bound to every model call, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Register `list_tools` over everything registered so far, itself included.
    pub fn with_catalog_listing(mut self) -> Self {
        let mut entries: Vec<(&'static str, &'static str)> = self
            .tools
            .values()
            .map(|tool| (tool.name(), tool.description()))
            .collect();
        entries.push((catalog::ListToolsTool::NAME, catalog::ListToolsTool::DESCRIPTION));
        entries.sort_by_key(|(name, _)| *name);

        self.register(Arc::new(catalog::ListToolsTool::new(entries)));
        self
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Draft-07 schema for an argument struct, inlined, without `$schema`/`title`.
pub fn schema_for<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<T>();

    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("title");
        obj.entry("properties").or_insert_with(|| json!({}));
    }
    value
}

/// Typed view of the model-supplied arguments.
pub fn parse_args<T: DeserializeOwned>(input: &ToolInput) -> Result<T> {
    let params = match &input.parameters {
        Value::Null => json!({}),
        other => other.clone(),
    };

    serde_json::from_value(params).map_err(|e| {
        AgentError::InvalidToolInput(format!("Invalid arguments for {}: {}", input.tool_name, e))
    })
}

/// Shared adapter clients.
#[derive(Clone)]
pub struct DataSources {
    pub sec: Arc<SecClient>,
    pub finnhub: Arc<FinnhubClient>,
    pub yahoo: Arc<YahooSearchClient>,
    pub tavily: Arc<TavilyClient>,
    /// Deadline applied to each tool call by the executor.
    pub tool_timeout: Duration,
}

impl DataSources {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = settings.tool_timeout;

        Ok(Self {
            sec: Arc::new(SecClient::new(
                &settings.sec_data_base_url,
                &settings.sec_www_base_url,
                &settings.sec_user_agent,
                timeout,
            )?),
            finnhub: Arc::new(FinnhubClient::new(
                &settings.finnhub_base_url,
                settings.finnhub_api_key.clone(),
                timeout,
            )?),
            yahoo: Arc::new(YahooSearchClient::new(&settings.yahoo_search_base_url, timeout)?),
            tavily: Arc::new(TavilyClient::new(
                &settings.tavily_base_url,
                settings.tavily_api_key.clone(),
                timeout,
            )?),
            tool_timeout: timeout,
        })
    }
}

/// Create the full research tool catalog.
pub fn create_default_registry(settings: &Settings) -> Result<ToolRegistry> {
    let sources = DataSources::from_settings(settings)?;
    Ok(build_registry(&sources))
}

pub fn build_registry(sources: &DataSources) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(search::WebSearchTool::new(sources.tavily.clone())));
    registry.register(Arc::new(lookup::TickerLookupTool::new(sources.yahoo.clone())));
    registry.register(Arc::new(lookup::CikLookupTool::new(sources.sec.clone())));
    registry.register(Arc::new(filings::LatestFilingsTool::new(sources.sec.clone())));
    registry.register(Arc::new(filings::FinancialStatementTool::new(sources.sec.clone())));
    registry.register(Arc::new(market::StockPriceTool::new(sources.finnhub.clone())));
    registry.register(Arc::new(market::AnalystRatingTool::new(sources.finnhub.clone())));
    registry.register(Arc::new(market::EarningsTool::new(sources.finnhub.clone())));
    registry.register(Arc::new(market::CompanyNewsTool::new(sources.finnhub.clone())));
    registry.register(Arc::new(peers::PeerComparisonTool::new(sources.clone())));
    registry.register(Arc::new(clients::SaveClientInfoTool));
    registry.register(Arc::new(clients::GetClientInfoTool));
    registry.register(Arc::new(human::HumanAssistanceTool));

    registry.with_catalog_listing()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::memory::InMemoryStore;
    use std::time::Duration;

    pub fn context() -> ToolContext {
        ToolContext {
            memory: Arc::new(InMemoryStore::new()),
            thread_id: Uuid::new_v4(),
        }
    }

    pub fn input(tool_name: &str, parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: tool_name.to_string(),
            parameters,
        }
    }

    type Responder = dyn Fn(&Value) -> Result<ToolOutcome> + Send + Sync;

    /// Tool with a fixed name whose behavior is a closure over the arguments.
    pub struct StubTool {
        name: &'static str,
        delay: Option<Duration>,
        responder: Box<Responder>,
    }

    impl StubTool {
        pub fn new(
            name: &'static str,
            responder: impl Fn(&Value) -> Result<ToolOutcome> + Send + Sync + 'static,
        ) -> Self {
            Self {
                name,
                delay: None,
                responder: Box::new(responder),
            }
        }

        pub fn returning(name: &'static str, value: Value) -> Self {
            Self::new(name, move |_| Ok(ToolOutcome::Completed(value.clone())))
        }

        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait::async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "stub"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, input: &ToolInput, _ctx: &ToolContext) -> Result<ToolOutcome> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.responder)(&input.parameters)
        }
    }

    /// Every adapter pointed at one mock server, with test keys.
    pub fn sources(base_url: &str) -> DataSources {
        let timeout = Duration::from_secs(5);
        DataSources {
            sec: Arc::new(SecClient::new(base_url, base_url, "test agent@example.com", timeout).unwrap()),
            finnhub: Arc::new(FinnhubClient::new(base_url, Some("test-key".into()), timeout).unwrap()),
            yahoo: Arc::new(YahooSearchClient::new(base_url, timeout).unwrap()),
            tavily: Arc::new(TavilyClient::new(base_url, Some("test-key".into()), timeout).unwrap()),
            tool_timeout: timeout,
        }
    }
}
