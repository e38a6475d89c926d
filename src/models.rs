//! Core data models for the research agent

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

//
// ================= Messages =================
//

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back on the matching tool result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    Success,
    NotFound,
    Error,
    /// Result supplied by a human after a suspension.
    Human,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageBody {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        status: ToolResultStatus,
        content: Value,
    },
}

/// One entry of the conversation log. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub message_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub body: MessageBody,
}

impl Message {
    fn with_body(body: MessageBody) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            created_at: Utc::now(),
            body,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_body(MessageBody::User {
            content: content.into(),
        })
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::with_body(MessageBody::Assistant {
            content: content.into(),
            tool_calls,
        })
    }

    pub fn tool_result(call: &ToolCallRequest, status: ToolResultStatus, content: Value) -> Self {
        Self::with_body(MessageBody::Tool {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            status,
            content,
        })
    }

    pub fn is_user(&self) -> bool {
        matches!(self.body, MessageBody::User { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self.body, MessageBody::Tool { .. })
    }

    /// Plain text of user and assistant messages.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::User { content } | MessageBody::Assistant { content, .. } => {
                Some(content.as_str())
            }
            MessageBody::Tool { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.body {
            MessageBody::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

//
// ================= Human-in-the-loop =================
//

/// Question put to a human when a tool cannot decide on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HumanQuery {
    pub query: String,
    /// Candidate values; a 1-based numeric answer selects one of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

impl HumanQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            options: Vec::new(),
        }
    }

    pub fn choose_from(query: impl Into<String>, options: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            options,
        }
    }

    /// Turn the human's answer into a tool result payload.
    pub fn resolve(&self, answer: &str) -> Value {
        let trimmed = answer.trim();
        if let Ok(choice) = trimmed.parse::<usize>() {
            if choice >= 1 && choice <= self.options.len() {
                return self.options[choice - 1].clone();
            }
        }
        Value::String(trimmed.to_string())
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: Value,
}

/// What the model sees of a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

//
// ================= Client Memory =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct PeerInfo {
    /// Company short name as reported by the ticker search.
    pub name: String,
    pub ticker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ClientRecord {
    /// Company CIK of the form 'CIK0001730168'.
    pub cik: String,
    /// Company name.
    pub name: String,
    /// Company tickers, at least one.
    pub tickers: Vec<String>,
    /// Known peer companies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<PeerInfo>>,
}

/// Single ticker search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickerMatch {
    pub name: String,
    pub symbol: String,
}

//
// ================= Blueprints =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Chatbot,
    Blueprint,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlueprintName {
    #[serde(rename = "Peer Comparison")]
    PeerComparison,
    #[serde(rename = "Debt Profiling")]
    DebtProfiling,
    #[serde(rename = "Financing Need")]
    FinancingNeed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepName {
    #[serde(rename = "Revenue Comparison")]
    RevenueComparison,
    #[serde(rename = "Cost Comparison")]
    CostComparison,
    #[serde(rename = "Profitability Comparison")]
    ProfitabilityComparison,
    #[serde(rename = "Leverage Comparison")]
    LeverageComparison,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PhaseName {
    #[serde(rename = "Set Parameters")]
    SetParameters,
    #[serde(rename = "Collect Data")]
    CollectData,
    #[serde(rename = "Process Data")]
    ProcessData,
    #[serde(rename = "Generate Output")]
    GenerateOutput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    Started,
    Completed,
    Waiting,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseExecutionStatus {
    pub phase: PhaseName,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepExecutionStatus {
    pub step: StepName,
    pub phases: Vec<PhaseExecutionStatus>,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueprintExecutionStatus {
    pub blueprint: BlueprintName,
    pub status: ExecutionStatus,
    pub steps: Vec<StepExecutionStatus>,
    #[serde(default)]
    pub input: Option<String>,
}

const PHASES: [PhaseName; 4] = [
    PhaseName::SetParameters,
    PhaseName::CollectData,
    PhaseName::ProcessData,
    PhaseName::GenerateOutput,
];

impl BlueprintName {
    pub fn steps(&self) -> &'static [StepName] {
        match self {
            BlueprintName::PeerComparison => &[
                StepName::RevenueComparison,
                StepName::CostComparison,
                StepName::ProfitabilityComparison,
                StepName::LeverageComparison,
            ],
            // Steps for these are not defined yet
            BlueprintName::DebtProfiling | BlueprintName::FinancingNeed => &[],
        }
    }
}

impl BlueprintExecutionStatus {
    /// Fresh status skeleton: blueprint started, every phase not started.
    pub fn start(blueprint: BlueprintName, input: Option<String>) -> Self {
        let steps = blueprint
            .steps()
            .iter()
            .map(|step| StepExecutionStatus {
                step: *step,
                phases: PHASES
                    .iter()
                    .map(|phase| PhaseExecutionStatus {
                        phase: *phase,
                        status: ExecutionStatus::NotStarted,
                        input: None,
                    })
                    .collect(),
                input: None,
            })
            .collect();

        Self {
            blueprint,
            status: ExecutionStatus::Started,
            steps,
            input,
        }
    }
}

impl fmt::Display for BlueprintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlueprintName::PeerComparison => "Peer Comparison",
            BlueprintName::DebtProfiling => "Debt Profiling",
            BlueprintName::FinancingNeed => "Financing Need",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_human_query_resolves_numeric_choice() {
        let query = HumanQuery::choose_from(
            "Pick one",
            vec![
                json!({"name": "Micron Technology", "symbol": "MU"}),
                json!({"name": "Micron Solutions", "symbol": "MICR"}),
            ],
        );

        assert_eq!(query.resolve(" 2 "), json!({"name": "Micron Solutions", "symbol": "MICR"}));
        assert_eq!(query.resolve("3"), json!("3"));
        assert_eq!(query.resolve("the first one"), json!("the first one"));
    }

    #[test]
    fn test_message_body_tagging() {
        let msg = Message::assistant(
            "",
            vec![ToolCallRequest::new("call_1", "get_stock_price", json!({"ticker": "MU"}))],
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["body"]["role"], "assistant");
        assert_eq!(msg.tool_calls().len(), 1);
        assert!(!msg.is_user());
    }

    #[test]
    fn test_peer_comparison_skeleton() {
        let status = BlueprintExecutionStatus::start(BlueprintName::PeerComparison, None);
        assert_eq!(status.status, ExecutionStatus::Started);
        assert_eq!(status.steps.len(), 4);
        assert!(status
            .steps
            .iter()
            .all(|s| s.phases.len() == 4
                && s.phases.iter().all(|p| p.status == ExecutionStatus::NotStarted)));

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["blueprint"], "Peer Comparison");
        assert_eq!(value["steps"][0]["phases"][0]["status"], "Not Started");
    }

    #[test]
    fn test_client_record_without_peers() {
        let record: ClientRecord = serde_json::from_value(json!({
            "cik": "CIK0000723125",
            "name": "Micron Technology",
            "tickers": ["MU"]
        }))
        .unwrap();
        assert!(record.peers.is_none());
        assert!(serde_json::to_value(&record).unwrap().get("peers").is_none());
    }
}
